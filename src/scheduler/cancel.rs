//! Cancellation slot for the long-running extras task.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Holds the cancel token of the running extras task.
///
/// A token is created when the task starts and must be cleared before
/// another run may start.
#[derive(Debug, Default)]
pub struct CancelSlot {
    token: Mutex<Option<CancellationToken>>,
}

impl CancelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the token for a new run.
    ///
    /// If a token is still present it is stale: it gets cancelled and cleared,
    /// and this start is aborted by returning `None`.
    pub async fn start(&self) -> Option<CancellationToken> {
        let mut slot = self.token.lock().await;

        if let Some(stale) = slot.take() {
            stale.cancel();
            tracing::warn!("Found a stale extras cancel token; reset it and skipped this start");
            return None;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Forget the token after a run finished.
    pub async fn clear(&self) {
        self.token.lock().await.take();
    }

    /// Cancel the running task, if any. Returns whether a token was present.
    pub async fn cancel(&self) -> bool {
        match self.token.lock().await.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_armed(&self) -> bool {
        self.token.lock().await.is_some()
    }
}
