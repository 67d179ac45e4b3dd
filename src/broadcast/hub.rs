//! Fan-out of live updates to connected observers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::broadcast::message::LiveMessage;
use crate::error::Result;
use crate::queue::Record;
use crate::scheduler::StatusSnapshot;

/// Messages buffered per observer before further ones are dropped.
pub const OBSERVER_BUFFER: usize = 64;

/// Identifier of a connected observer.
pub type ObserverId = Uuid;

/// Set of live observers. Holds no durable state.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    observers: Arc<RwLock<HashMap<ObserverId, mpsc::Sender<String>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Adding an id that is already present keeps the
    /// existing registration. Returns whether the observer was newly added.
    pub async fn add(&self, id: ObserverId, sender: mpsc::Sender<String>) -> bool {
        let mut observers = self.observers.write().await;
        if observers.contains_key(&id) {
            return false;
        }
        observers.insert(id, sender);
        true
    }

    /// Unregister an observer. Returns whether it was present.
    pub async fn remove(&self, id: ObserverId) -> bool {
        self.observers.write().await.remove(&id).is_some()
    }

    /// Register a new observer whose first message is `initial`.
    pub async fn subscribe(
        &self,
        initial: &LiveMessage,
    ) -> Result<(ObserverId, mpsc::Receiver<String>)> {
        let message = initial.clone();
        self.subscribe_with(|| async move { Ok(message) }).await
    }

    /// Register a new observer whose first message is built by `initial`.
    ///
    /// The observer set stays locked while the snapshot is built, so every
    /// broadcast either is already reflected in it or is delivered after it.
    /// `initial` must not broadcast itself.
    pub async fn subscribe_with<F, Fut>(
        &self,
        initial: F,
    ) -> Result<(ObserverId, mpsc::Receiver<String>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LiveMessage>>,
    {
        let mut observers = self.observers.write().await;

        let text = serde_json::to_string(&initial().await?)?;
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);

        // The channel is empty, so the initial state always lands first.
        let _ = tx.try_send(text);

        let id = Uuid::new_v4();
        observers.insert(id, tx);
        tracing::debug!("Observer {} connected", id);

        Ok((id, rx))
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Push changed queue records. Does nothing when `changed` is empty.
    pub async fn broadcast_queue(&self, changed: Vec<Record>) -> usize {
        if changed.is_empty() {
            return 0;
        }
        self.broadcast(&LiveMessage::DownloadQueueUpdate { queue: changed })
            .await
    }

    /// Push a full status snapshot.
    pub async fn broadcast_status(&self, snapshot: StatusSnapshot) -> usize {
        self.broadcast(&LiveMessage::from(snapshot)).await
    }

    /// Send a message to every observer. Returns how many accepted it.
    ///
    /// A failing observer is logged and skipped; delivery to the others continues.
    pub async fn broadcast(&self, message: &LiveMessage) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize live message: {}", e);
                return 0;
            }
        };

        let observers = self.observers.read().await;
        let mut delivered = 0;

        for (id, sender) in observers.iter() {
            match sender.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Observer {} is lagging, dropping update", id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Observer {} is gone, skipping", id);
                }
            }
        }

        delivered
    }
}
