//! Messages pushed to live observers.

use serde::Serialize;

use crate::queue::Record;
use crate::scheduler::{RunOutcome, StatusSnapshot, TaskSnapshot};

/// JSON message sent over the live-update channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Records that changed since the previous update.
    DownloadQueueUpdate { queue: Vec<Record> },

    /// Full schedule and queue state.
    TaskStatus {
        tasks: Vec<TaskSnapshot>,
        queue: Vec<Record>,
    },

    /// Reply to a force request from one client.
    TaskForced { task: String, outcome: RunOutcome },

    /// Reply to a cancel request from one client.
    ExtrasCancelled { cancelled: bool },

    /// A client request could not be served.
    Error { message: String },
}

impl From<StatusSnapshot> for LiveMessage {
    fn from(snapshot: StatusSnapshot) -> Self {
        LiveMessage::TaskStatus {
            tasks: snapshot.tasks,
            queue: snapshot.queue,
        }
    }
}
