//! Task state and status snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::queue::Record;

/// Radarr catalog sync.
pub const TASK_RADARR_SYNC: &str = "radarr_sync";

/// Sonarr catalog sync.
pub const TASK_SONARR_SYNC: &str = "sonarr_sync";

/// Download of missing extras.
pub const TASK_EXTRAS: &str = "extras";

/// Longest accepted task interval (one year).
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// Scheduling state of one named task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub id: String,
    pub label: String,
    pub interval_minutes: u64,
    /// Completion time of the last run.
    pub last_execution: Option<DateTime<Utc>>,
    /// Duration of the last run in seconds.
    pub last_duration: f64,
    pub last_error: Option<String>,
    pub run_state: RunState,
}

impl TaskState {
    /// State of a task that has never run.
    pub fn new(id: impl Into<String>, label: impl Into<String>, interval_minutes: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            interval_minutes,
            last_execution: None,
            last_duration: 0.0,
            last_error: None,
            run_state: RunState::Idle,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes as i64)
    }

    /// Next planned run: one interval after the last run, or one interval
    /// from `now` for a task that has never run.
    pub fn next_execution(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_execution {
            Some(last) => last + self.interval(),
            None => now + self.interval(),
        }
    }

    /// Whether the task should run at startup instead of waiting.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_execution {
            Some(last) => now >= last + self.interval(),
            None => true,
        }
    }

    /// Record a finished run.
    pub fn complete(&mut self, finished: DateTime<Utc>, duration_secs: f64, error: Option<String>) {
        self.last_execution = Some(finished);
        self.last_duration = duration_secs;
        self.last_error = error;
        self.run_state = RunState::Idle;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TaskSnapshot {
        TaskSnapshot {
            name: self.id.clone(),
            label: self.label.clone(),
            interval: self.interval_minutes,
            last_execution: self.last_execution,
            last_duration: self.last_duration,
            next_execution: self.next_execution(now),
            status: self.run_state,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of a task for status polling and live updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub name: String,
    pub label: String,
    /// Interval in minutes.
    pub interval: u64,
    pub last_execution: Option<DateTime<Utc>>,
    pub last_duration: f64,
    pub next_execution: DateTime<Utc>,
    pub status: RunState,
    pub last_error: Option<String>,
}

/// Full scheduler status: every task plus the current queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub tasks: Vec<TaskSnapshot>,
    pub queue: Vec<Record>,
}
