//! Persisted last-run bookkeeping.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::fs::write_atomic;

/// Persisted part of a task's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeRecord {
    pub name: String,

    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,

    /// Seconds.
    #[serde(default)]
    pub last_duration: f64,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl TaskTimeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_execution: None,
            last_duration: 0.0,
            last_error: None,
        }
    }
}

/// JSON array file of [`TaskTimeRecord`]s, rewritten in full on every update.
///
/// Every read-modify-write cycle holds one lock, so concurrent updates for
/// different tasks never overwrite each other.
#[derive(Debug)]
pub struct TaskTimesFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskTimesFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All persisted records. A missing file yields an empty list.
    pub async fn load(&self) -> Result<Vec<TaskTimeRecord>> {
        let _guard = self.lock.lock().await;
        self.read_locked().await
    }

    /// Make sure a record exists for each name, creating fresh ones as needed.
    pub async fn ensure(&self, names: &[&str]) -> Result<Vec<TaskTimeRecord>> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_locked().await?;

        let mut added = false;
        for name in names {
            if !records.iter().any(|r| r.name == *name) {
                records.push(TaskTimeRecord::new(*name));
                added = true;
            }
        }

        if added {
            self.write_locked(&records).await?;
        }

        Ok(records)
    }

    /// Replace the record with the same name, or append it.
    pub async fn update(&self, record: TaskTimeRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_locked().await?;

        match records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }

        self.write_locked(&records).await
    }

    async fn read_locked(&self) -> Result<Vec<TaskTimeRecord>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&content)?)
    }

    async fn write_locked(&self, records: &[TaskTimeRecord]) -> Result<()> {
        let content = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &content).await
    }
}
