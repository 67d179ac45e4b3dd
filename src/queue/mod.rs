//! Download queue module.
//!
//! This module provides:
//! - Record types for download attempts
//! - Append-only, store-backed queue history
//! - Deduplication and diffing of queue snapshots
//! - A polling watcher over the exported queue file

pub mod history;
pub mod record;
pub mod snapshot;
pub mod watch;

pub use history::{Queue, QUEUE_KEY, STATUS_LIMIT};
pub use record::{ExtraRequest, MediaType, Record, Status};
pub use snapshot::{dedup, diff, most_recent};
pub use watch::QueueWatcher;
