//! Polling watcher for the exported queue file.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::queue::record::Record;
use crate::queue::snapshot::{dedup, diff};

/// Default interval between modification checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Watches a JSON array of records and reports what changed between reloads.
#[derive(Debug)]
pub struct QueueWatcher {
    path: PathBuf,
    poll_interval: Duration,
    /// Modification time and length of the last loaded version.
    last_marker: Option<(SystemTime, u64)>,
    last: Vec<Record>,
}

impl QueueWatcher {
    /// Create a watcher for `path`. The first successful poll reports every record.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_marker: None,
            last: Vec::new(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the file once.
    ///
    /// Returns the changed records when the modification marker moved and the
    /// reloaded snapshot differs from the previous one, `None` otherwise.
    pub async fn poll(&mut self) -> Result<Option<Vec<Record>>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Length catches rewrites that land within the filesystem's timestamp granularity.
        let marker = (metadata.modified()?, metadata.len());
        if self.last_marker == Some(marker) {
            return Ok(None);
        }

        let content = tokio::fs::read(&self.path).await?;
        let records: Vec<Record> = if content.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice(&content)?
        };

        let current = dedup(&records);
        let changed = diff(&self.last, &current);

        self.last = current;
        self.last_marker = Some(marker);

        if changed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(changed))
        }
    }

    /// Poll until `cancel` fires, calling `on_change` once per detected change.
    pub async fn run<F, Fut>(mut self, cancel: CancellationToken, mut on_change: F)
    where
        F: FnMut(Vec<Record>) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        tracing::debug!("Watching {}", self.path.display());
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Queue watcher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll().await {
                        Ok(Some(changed)) => on_change(changed).await,
                        Ok(None) => {}
                        Err(e) => tracing::warn!("Failed to reload {}: {}", self.path.display(), e),
                    }
                }
            }
        }
    }
}
