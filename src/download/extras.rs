//! The extras task: download every wanted extra that is not settled yet.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::download::wanted::WantedSource;
use crate::download::ytdlp::Downloader;
use crate::error::Result;
use crate::fs::extra_output_dir;
use crate::queue::{ExtraRequest, Queue};
use crate::scheduler::Job;

/// Default pause between two downloads.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(5);

/// Default number of queue history entries kept after a run.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Totals of one extras run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtrasSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

pub struct ExtrasJob {
    queue: Queue,
    wanted: Arc<dyn WantedSource>,
    downloader: Arc<dyn Downloader>,
    output_root: PathBuf,
    throttle: Duration,
    history_limit: usize,
}

impl ExtrasJob {
    pub fn new(
        queue: Queue,
        wanted: Arc<dyn WantedSource>,
        downloader: Arc<dyn Downloader>,
        output_root: PathBuf,
    ) -> Self {
        Self {
            queue,
            wanted,
            downloader,
            output_root,
            throttle: DEFAULT_THROTTLE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Cap the queue history after each run; 0 disables capping.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Process the wanted list once.
    pub async fn process(&self, cancel: &CancellationToken) -> Result<ExtrasSummary> {
        let wanted = self.wanted.wanted().await?;
        let mut summary = ExtrasSummary::default();

        let mut pending = Vec::with_capacity(wanted.len());
        for request in wanted {
            match self.queue.current_for(&request.youtube_id)? {
                Some(record) if record.status.is_settled() => summary.skipped += 1,
                _ => pending.push(request),
            }
        }

        info!(
            "Extras: {} pending, {} already handled",
            pending.len(),
            summary.skipped
        );

        for (i, request) in pending.into_iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if i > 0 && !self.throttle.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.throttle) => {}
                }
            }

            if self.download_one(request).await? {
                summary.downloaded += 1;
            } else {
                summary.failed += 1;
            }
        }

        if summary.cancelled {
            info!("Extras run cancelled");
        }

        if self.history_limit > 0 {
            let removed = self.queue.cap(self.history_limit).await?;
            if removed > 0 {
                info!("Trimmed {} old queue entries", removed);
            }
        }

        Ok(summary)
    }

    /// Returns whether the extra was downloaded. Download failures end up in
    /// the queue record; only queue errors are returned.
    async fn download_one(&self, request: ExtraRequest) -> Result<bool> {
        let queued = self.queue.enqueue(request).await?;
        let running = queued.start();
        self.queue.advance(&running).await?;

        info!(
            "Downloading {} '{}' for {}",
            running.request.extra_type, running.request.extra_title, running.request.media_title
        );

        let outcome = match extra_output_dir(&self.output_root, &running.request) {
            Ok(dir) => self.downloader.download(&running.request, &dir).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(path) => {
                info!("Saved {}", path.display());
                self.queue.advance(&running.finish(None)).await?;
                Ok(true)
            }
            Err(e) => {
                warn!("Download of {} failed: {}", running.key(), e);
                self.queue
                    .advance(&running.finish(Some(e.to_string())))
                    .await?;
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Job for ExtrasJob {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let summary = self.process(&cancel).await?;
        info!(
            "Extras run finished: {} downloaded, {} failed, {} skipped",
            summary.downloaded, summary.failed, summary.skipped
        );
        Ok(())
    }
}
