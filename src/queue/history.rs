//! Store-backed download queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fs::write_atomic;
use crate::queue::record::{ExtraRequest, Record, Status};
use crate::queue::snapshot::{dedup, latest_positions, most_recent};
use crate::store::Store;

/// Store list holding every appended record state.
pub const QUEUE_KEY: &str = "download_queue";

/// Maximum number of records reported in a status snapshot.
pub const STATUS_LIMIT: usize = 100;

/// Append-only record of download attempts.
///
/// The queue is the only writer of records. Each transition appends a new
/// state to a store list; the current state of an extra is whatever
/// [`dedup`] keeps. Appends and composite operations (export, cap) share one
/// lock so the exported snapshot always reflects appends in order.
#[derive(Debug, Clone)]
pub struct Queue {
    store: Store,
    lock: Arc<Mutex<()>>,
    export_path: Option<PathBuf>,
}

impl Queue {
    /// Create a queue over a store.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
            export_path: None,
        }
    }

    /// Rewrite the deduplicated queue to `path` after every change.
    pub fn with_export(mut self, path: PathBuf) -> Self {
        self.export_path = Some(path);
        self
    }

    /// Path of the exported snapshot, if any.
    pub fn export_path(&self) -> Option<&Path> {
        self.export_path.as_deref()
    }

    /// Queue a new download attempt.
    pub async fn enqueue(&self, request: ExtraRequest) -> Result<Record> {
        let record = Record::queued(request);
        self.advance(&record).await?;
        Ok(record)
    }

    /// Append a new state for a record.
    pub async fn advance(&self, record: &Record) -> Result<()> {
        let _guard = self.lock.lock().await;
        let encoded = serde_json::to_vec(record)?;
        self.store.rpush(QUEUE_KEY, &encoded)?;

        tracing::debug!(
            "Queue: {} -> {}",
            record.key(),
            record.status
        );

        self.export_locked().await
    }

    /// Every appended state, oldest first.
    pub fn records(&self) -> Result<Vec<Record>> {
        let raw = self.store.lrange(QUEUE_KEY, 0, -1)?;
        let mut records = Vec::with_capacity(raw.len());

        for entry in raw {
            match serde_json::from_slice::<Record>(&entry) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable queue entry: {}", e),
            }
        }

        Ok(records)
    }

    /// Current state of each extra.
    pub fn current(&self) -> Result<Vec<Record>> {
        Ok(dedup(&self.records()?))
    }

    /// Current state of one extra.
    pub fn current_for(&self, youtube_id: &str) -> Result<Option<Record>> {
        Ok(self
            .current()?
            .into_iter()
            .find(|record| record.key() == youtube_id))
    }

    /// Current states, most recently queued first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Record>> {
        Ok(most_recent(&self.records()?, limit))
    }

    /// Append a status change (e.g. rejected or deleted) for an existing extra.
    pub async fn set_status(&self, youtube_id: &str, status: Status) -> Result<Record> {
        let current = self
            .current_for(youtube_id)?
            .ok_or_else(|| Error::NotFound(youtube_id.to_string()))?;

        let updated = current.with_status(status);
        self.advance(&updated).await?;
        Ok(updated)
    }

    /// Mark extras left running by an interrupted process as failed.
    ///
    /// Returns how many records were marked.
    pub async fn fail_stale(&self, reason: &str) -> Result<usize> {
        let stale: Vec<Record> = self
            .current()?
            .into_iter()
            .filter(|record| record.status == Status::Running)
            .collect();

        for record in &stale {
            self.advance(&record.finish(Some(reason.to_string()))).await?;
        }

        if !stale.is_empty() {
            tracing::info!("Marked {} interrupted download(s) as failed", stale.len());
        }

        Ok(stale.len())
    }

    /// Trim the history towards `max_entries` appended states.
    ///
    /// Only superseded states are dropped, oldest first. The current state of
    /// every extra is always kept, so the history may stay above the limit.
    /// Returns the number of dropped entries.
    pub async fn cap(&self, max_entries: usize) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let raw = self.store.lrange(QUEUE_KEY, 0, -1)?;
        if raw.len() <= max_entries {
            return Ok(0);
        }

        let mut positions = Vec::with_capacity(raw.len());
        let mut records = Vec::with_capacity(raw.len());
        for (index, entry) in raw.iter().enumerate() {
            // Unreadable entries are never anyone's current state.
            if let Ok(record) = serde_json::from_slice::<Record>(entry) {
                positions.push(index);
                records.push(record);
            }
        }

        let mut keep = vec![false; raw.len()];
        for i in latest_positions(&records) {
            keep[positions[i]] = true;
        }

        let excess = raw.len() - max_entries;
        let mut dropped = 0;
        for (index, entry) in raw.iter().enumerate() {
            if dropped == excess {
                break;
            }
            if keep[index] {
                continue;
            }
            // Equal bytes earlier in the list are superseded too, so removing
            // the first match is equivalent.
            dropped += self.store.lrem(QUEUE_KEY, 1, entry)?;
        }

        if dropped > 0 {
            tracing::debug!("Trimmed {} superseded queue entries", dropped);
            self.export_locked().await?;
        }

        Ok(dropped)
    }

    /// Write the current snapshot to the export path, if configured.
    pub async fn export(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.export_locked().await
    }

    async fn export_locked(&self) -> Result<()> {
        let Some(path) = &self.export_path else {
            return Ok(());
        };

        let content = serde_json::to_vec_pretty(&self.current()?)?;
        write_atomic(path, &content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::fixtures::request;
    use tempfile::TempDir;

    fn open_queue() -> (TempDir, Queue) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("queue.redb")).unwrap();
        (dir, Queue::new(store))
    }

    #[tokio::test]
    async fn test_history_is_appended_and_deduplicated() {
        let (_dir, queue) = open_queue();

        let queued = queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();
        let running = queued.start();
        queue.advance(&running).await.unwrap();
        queue
            .advance(&running.finish(Some("HTTP 404".into())))
            .await
            .unwrap();

        assert_eq!(queue.records().unwrap().len(), 3);

        let current = queue.current().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].status, Status::Error);
        assert_eq!(current[0].error.as_deref(), Some("HTTP 404"));
    }

    #[tokio::test]
    async fn test_requeue_supersedes_failed_attempt() {
        let (_dir, queue) = open_queue();

        let first = queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();
        queue
            .advance(&first.start().finish(Some("timeout".into())))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();

        let current = queue.current_for("aaaaaaaaaaa").unwrap().unwrap();
        assert_eq!(current.status, Status::Queued);
        assert!(current.queued > first.queued);
    }

    #[tokio::test]
    async fn test_set_status() {
        let (_dir, queue) = open_queue();
        queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();

        let rejected = queue
            .set_status("aaaaaaaaaaa", Status::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.status, Status::Rejected);

        let missing = queue.set_status("zzzzzzzzzzz", Status::Deleted).await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fail_stale_marks_running() {
        let (_dir, queue) = open_queue();

        let a = queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();
        queue.advance(&a.start()).await.unwrap();
        queue.enqueue(request("bbbbbbbbbbb")).await.unwrap();

        assert_eq!(queue.fail_stale("interrupted").await.unwrap(), 1);

        let a = queue.current_for("aaaaaaaaaaa").unwrap().unwrap();
        assert_eq!(a.status, Status::Error);
        let b = queue.current_for("bbbbbbbbbbb").unwrap().unwrap();
        assert_eq!(b.status, Status::Queued);
    }

    #[tokio::test]
    async fn test_cap_drops_only_superseded_states() {
        let (_dir, queue) = open_queue();

        let a = queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();
        let running = a.start();
        queue.advance(&running).await.unwrap();
        queue
            .advance(&running.finish(Some("HTTP 404".into())))
            .await
            .unwrap();
        queue.enqueue(request("bbbbbbbbbbb")).await.unwrap();
        queue.enqueue(request("ccccccccccc")).await.unwrap();

        assert_eq!(queue.cap(5).await.unwrap(), 0);
        assert_eq!(queue.cap(4).await.unwrap(), 1);
        assert_eq!(queue.records().unwrap().len(), 4);

        // Below the number of extras: every current state survives.
        assert_eq!(queue.cap(1).await.unwrap(), 1);
        let records = queue.records().unwrap();
        let keys: Vec<&str> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);
        assert_eq!(records[0].status, Status::Error);
        assert_eq!(records[0].error.as_deref(), Some("HTTP 404"));

        assert_eq!(queue.cap(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_export_writes_current_snapshot() {
        let (dir, queue) = open_queue();
        let path = dir.path().join("queue.json");
        let queue = queue.with_export(path.clone());

        let record = queue.enqueue(request("aaaaaaaaaaa")).await.unwrap();
        queue.advance(&record.start()).await.unwrap();

        let exported: Vec<Record> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, Status::Running);
    }
}
