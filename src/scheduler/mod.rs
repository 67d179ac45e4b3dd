//! Recurring task scheduler.
//!
//! This module provides:
//! - Task state with persisted last-run bookkeeping
//! - A single-flight guard and a cancellation slot for the extras task
//! - The [`Job`] trait implemented by task bodies
//! - The [`Scheduler`] running timer loops and forced runs

pub mod cancel;
pub mod guard;
pub mod job;
pub mod runner;
pub mod task;
pub mod times;

pub use cancel::CancelSlot;
pub use guard::{RunPermit, SingleFlight};
pub use job::{job_fn, FnJob, Job};
pub use runner::{RunOutcome, Scheduler, TaskSpec};
pub use task::{
    RunState, StatusSnapshot, TaskSnapshot, TaskState, MAX_INTERVAL_MINUTES, TASK_EXTRAS,
    TASK_RADARR_SYNC, TASK_SONARR_SYNC,
};
pub use times::{TaskTimeRecord, TaskTimesFile};
