//! Websocket listener for live updates.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, LiveMessage};
use crate::error::{Error, Result};
use crate::live::command::handle_command;
use crate::scheduler::Scheduler;

/// Accepts websocket clients and registers each one as an observer.
pub struct LiveServer {
    listener: TcpListener,
    scheduler: Scheduler,
    broadcaster: Broadcaster,
}

impl LiveServer {
    pub async fn bind(addr: &str, scheduler: Scheduler, broadcaster: Broadcaster) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            scheduler,
            broadcaster,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires.
    pub async fn serve(self, shutdown: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Live updates on ws://{}", addr);
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Live server stopped");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let scheduler = self.scheduler.clone();
                        let broadcaster = self.broadcaster.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer, scheduler, broadcaster, shutdown).await
                            {
                                debug!("Live client {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Failed to accept live client: {}", e),
                },
            }
        }
    }
}

/// Serve one client: initial snapshot, then broadcasts and command replies.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    scheduler: Scheduler,
    broadcaster: Broadcaster,
    shutdown: CancellationToken,
) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let (id, mut outgoing) = broadcaster
        .subscribe_with(|| async { Ok(LiveMessage::from(scheduler.status().await?)) })
        .await?;
    info!("Live client {} connected from {}", id, peer);

    let result = async {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                message = outgoing.recv() => match message {
                    Some(text) => write.send(Message::Text(text)).await?,
                    None => break,
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_command(&scheduler, &text).await;
                        write.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::from(e)),
                },
            }
        }
        Ok(())
    }
    .await;

    broadcaster.remove(id).await;
    info!("Live client {} disconnected", id);

    result
}
