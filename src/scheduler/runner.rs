//! Scheduler loop.
//!
//! Each registered task gets its own tokio task that sleeps until the task
//! is due, triggers it, and re-arms its timer one interval after the run
//! completes. Task bodies are spawned separately, so a long run never
//! blocks the timer loop. A run triggered by the timer and one triggered by
//! [`Scheduler::force`] go through the same single-flight path.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::queue::{Queue, STATUS_LIMIT};
use crate::scheduler::cancel::CancelSlot;
use crate::scheduler::guard::{RunPermit, SingleFlight};
use crate::scheduler::job::Job;
use crate::scheduler::task::{
    RunState, StatusSnapshot, TaskSnapshot, TaskState, MAX_INTERVAL_MINUTES,
};
use crate::scheduler::times::{TaskTimeRecord, TaskTimesFile};

/// Registration of a recurring task.
pub struct TaskSpec {
    pub id: String,
    pub label: String,
    pub interval_minutes: u64,
    pub job: Arc<dyn Job>,
    /// Whether runs get a cancel token that [`Scheduler::cancel_extras`] fires.
    pub cancellable: bool,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        interval_minutes: u64,
        job: Arc<dyn Job>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            interval_minutes,
            job,
            cancellable: false,
        }
    }

    /// Mark this as the long-running, cancellable extras task.
    pub fn cancellable(mut self) -> Self {
        self.cancellable = true;
        self
    }
}

/// Result of asking a task to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// A run was spawned.
    Started,
    /// The task is running; nothing was started.
    AlreadyRunning,
    /// A stale cancel token was found and reset; nothing was started.
    Aborted,
}

struct TaskEntry {
    spec: TaskSpec,
    guard: Arc<SingleFlight>,
    state: RwLock<TaskState>,
    completed_tx: mpsc::UnboundedSender<DateTime<Utc>>,
    completed_rx: Mutex<Option<mpsc::UnboundedReceiver<DateTime<Utc>>>>,
}

impl TaskEntry {
    fn interval(&self) -> Duration {
        Duration::minutes(self.spec.interval_minutes as i64)
    }
}

struct Inner {
    tasks: Vec<Arc<TaskEntry>>,
    times: TaskTimesFile,
    queue: Queue,
    broadcaster: Broadcaster,
    extras_cancel: CancelSlot,
    shutdown: CancellationToken,
}

/// Registry of recurring tasks with single-flight execution.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Build the scheduler, loading persisted run times for every task.
    pub async fn new(
        specs: Vec<TaskSpec>,
        times: TaskTimesFile,
        queue: Queue,
        broadcaster: Broadcaster,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let mut names: Vec<&str> = Vec::with_capacity(specs.len());
        for spec in &specs {
            if names.contains(&spec.id.as_str()) {
                return Err(Error::Config(format!("Duplicate task id: {}", spec.id)));
            }
            if spec.interval_minutes == 0 || spec.interval_minutes > MAX_INTERVAL_MINUTES {
                return Err(Error::Config(format!(
                    "Task {} interval must be between 1 and {} minutes",
                    spec.id, MAX_INTERVAL_MINUTES
                )));
            }
            names.push(&spec.id);
        }

        let persisted = times.ensure(&names).await?;

        let tasks = specs
            .into_iter()
            .map(|spec| {
                let mut state = TaskState::new(&spec.id, &spec.label, spec.interval_minutes);
                if let Some(record) = persisted.iter().find(|r| r.name == spec.id) {
                    state.last_execution = record.last_execution;
                    state.last_duration = record.last_duration;
                    state.last_error = record.last_error.clone();
                }

                let (completed_tx, completed_rx) = mpsc::unbounded_channel();
                Arc::new(TaskEntry {
                    spec,
                    guard: SingleFlight::new(),
                    state: RwLock::new(state),
                    completed_tx,
                    completed_rx: Mutex::new(Some(completed_rx)),
                })
            })
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                tasks,
                times,
                queue,
                broadcaster,
                extras_cancel: CancelSlot::new(),
                shutdown,
            }),
        })
    }

    /// Spawn one timer loop per task. Overdue tasks run immediately.
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.inner.tasks.len());

        for entry in &self.inner.tasks {
            let Some(completed) = entry.completed_rx.lock().await.take() else {
                warn!("Task {} loop already started", entry.spec.id);
                continue;
            };

            let scheduler = self.clone();
            let entry = Arc::clone(entry);
            handles.push(tokio::spawn(scheduler.run_loop(entry, completed)));
        }

        info!("Scheduler started with {} tasks", handles.len());
        handles
    }

    async fn run_loop(
        self,
        entry: Arc<TaskEntry>,
        mut completed: mpsc::UnboundedReceiver<DateTime<Utc>>,
    ) {
        let id = entry.spec.id.clone();
        let now = Utc::now();

        let first = {
            let state = entry.state.read().await;
            if state.is_due(now) {
                info!("Task {} is due, running now", id);
                now
            } else {
                let next = state.next_execution(now);
                info!("Task {} next run at {}", id, next);
                next
            }
        };
        let mut deadline = Some(deadline_for(first));

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    debug!("Task {} loop stopped", id);
                    break;
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    match self.trigger(&entry).await {
                        // The completion notice re-arms the timer.
                        RunOutcome::Started | RunOutcome::AlreadyRunning => {}
                        RunOutcome::Aborted => {
                            deadline = Some(deadline_for(Utc::now() + entry.interval()));
                        }
                    }
                }
                Some(finished) = completed.recv() => {
                    let next = finished + entry.interval();
                    debug!("Task {} next run at {}", id, next);
                    deadline = Some(deadline_for(next));
                }
            }
        }
    }

    /// Run a task now through the same path as a timer fire.
    ///
    /// Fails with `UnknownTask` for an unregistered id without touching any state.
    pub async fn force(&self, task_id: &str) -> Result<RunOutcome> {
        let entry = self
            .entry(task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;

        info!("Forced run requested for task {}", task_id);
        Ok(self.trigger(entry).await)
    }

    async fn trigger(&self, entry: &Arc<TaskEntry>) -> RunOutcome {
        let Some(permit) = entry.guard.try_acquire() else {
            info!("Task {} is already running", entry.spec.id);
            return RunOutcome::AlreadyRunning;
        };

        let cancel = if entry.spec.cancellable {
            match self.inner.extras_cancel.start().await {
                Some(token) => token,
                None => {
                    permit.release();
                    return RunOutcome::Aborted;
                }
            }
        } else {
            CancellationToken::new()
        };

        entry.state.write().await.run_state = RunState::Running;

        let scheduler = self.clone();
        let entry = Arc::clone(entry);
        tokio::spawn(async move { scheduler.execute(entry, permit, cancel).await });

        RunOutcome::Started
    }

    async fn execute(&self, entry: Arc<TaskEntry>, permit: RunPermit, cancel: CancellationToken) {
        let id = entry.spec.id.clone();
        self.publish_status().await;

        info!("Starting task {}", id);
        let clock = std::time::Instant::now();
        let result = AssertUnwindSafe(entry.spec.job.run(cancel))
            .catch_unwind()
            .await;
        let duration = clock.elapsed().as_secs_f64();

        if entry.spec.cancellable {
            self.inner.extras_cancel.clear().await;
        }

        let error = match result {
            Ok(Ok(())) => {
                info!("Task {} finished in {:.1}s", id, duration);
                None
            }
            Ok(Err(e)) => {
                error!("Task {} failed after {:.1}s: {}", id, duration, e);
                Some(e.to_string())
            }
            Err(_) => {
                error!("Task {} panicked after {:.1}s", id, duration);
                Some("task panicked".to_string())
            }
        };

        let finished = Utc::now();
        let record = {
            let mut state = entry.state.write().await;
            state.complete(finished, duration, error);
            TaskTimeRecord {
                name: id.clone(),
                last_execution: state.last_execution,
                last_duration: state.last_duration,
                last_error: state.last_error.clone(),
            }
        };

        if let Err(e) = self.inner.times.update(record).await {
            error!("Failed to persist run time for task {}: {}", id, e);
        }

        permit.release();
        let _ = entry.completed_tx.send(finished);

        self.publish_status().await;
    }

    /// Snapshot of every task and the most recent queue entries.
    pub async fn status(&self) -> Result<StatusSnapshot> {
        let now = Utc::now();
        let mut tasks = Vec::with_capacity(self.inner.tasks.len());
        for entry in &self.inner.tasks {
            tasks.push(entry.state.read().await.snapshot(now));
        }

        let queue = self.inner.queue.recent(STATUS_LIMIT)?;
        Ok(StatusSnapshot { tasks, queue })
    }

    /// Snapshot of a single task.
    pub async fn task(&self, task_id: &str) -> Option<TaskSnapshot> {
        let entry = self.entry(task_id)?;
        let snapshot = entry.state.read().await.snapshot(Utc::now());
        Some(snapshot)
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.inner
            .tasks
            .iter()
            .map(|entry| entry.spec.id.as_str())
            .collect()
    }

    /// Push the full status to every live observer.
    pub async fn publish_status(&self) {
        match self.status().await {
            Ok(snapshot) => {
                self.inner.broadcaster.broadcast_status(snapshot).await;
            }
            Err(e) => warn!("Failed to build status snapshot: {}", e),
        }
    }

    /// Cancel the running extras task. Returns whether one was running.
    pub async fn cancel_extras(&self) -> bool {
        let cancelled = self.inner.extras_cancel.cancel().await;
        if cancelled {
            info!("Extras task cancellation requested");
        }
        cancelled
    }

    /// Stop every timer loop and cancel the extras task.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.extras_cancel.cancel().await;
    }

    fn entry(&self, task_id: &str) -> Option<&Arc<TaskEntry>> {
        self.inner.tasks.iter().find(|entry| entry.spec.id == task_id)
    }
}

/// Convert a wall-clock time into a timer deadline; past times fire immediately.
fn deadline_for(at: DateTime<Utc>) -> Instant {
    let delay = (at - Utc::now()).to_std().unwrap_or_default();
    Instant::now() + delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::job_fn;
    use crate::scheduler::task::{TASK_EXTRAS, TASK_RADARR_SYNC};
    use crate::store::Store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn counting_job(counter: Arc<AtomicUsize>) -> Arc<dyn Job> {
        job_fn(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn sleeping_job(millis: u64) -> Arc<dyn Job> {
        job_fn(move |_| async move {
            tokio::time::sleep(StdDuration::from_millis(millis)).await;
            Ok(())
        })
    }

    async fn build(dir: &TempDir, specs: Vec<TaskSpec>) -> (Scheduler, Broadcaster) {
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        let broadcaster = Broadcaster::new();
        let scheduler = Scheduler::new(
            specs,
            TaskTimesFile::new(dir.path().join("times.json")),
            Queue::new(store),
            broadcaster.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        (scheduler, broadcaster)
    }

    async fn write_last_run(dir: &TempDir, name: &str, minutes_ago: i64) -> DateTime<Utc> {
        let last = Utc::now() - Duration::minutes(minutes_ago);
        let mut record = TaskTimeRecord::new(name);
        record.last_execution = Some(last);
        TaskTimesFile::new(dir.path().join("times.json"))
            .update(record)
            .await
            .unwrap();
        last
    }

    async fn wait_idle(scheduler: &Scheduler, id: &str) -> TaskSnapshot {
        wait_finished_after(scheduler, id, None).await
    }

    /// Wait for a run that completed after `since`.
    async fn wait_finished_after(
        scheduler: &Scheduler,
        id: &str,
        since: Option<DateTime<Utc>>,
    ) -> TaskSnapshot {
        for _ in 0..200 {
            let task = scheduler.task(id).await.unwrap();
            if task.status == RunState::Idle && task.last_execution > since {
                return task;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("task {} did not finish", id);
    }

    #[tokio::test]
    async fn test_never_run_task_runs_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, counting_job(counter.clone()));
        let (scheduler, _) = build(&dir, vec![spec]).await;

        let handles = scheduler.start().await;
        let task = wait_idle(&scheduler, TASK_RADARR_SYNC).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let expected = Utc::now() + Duration::minutes(60);
        assert!((expected - task.next_execution).num_seconds().abs() <= 2);

        scheduler.stop().await;
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_overdue_task_runs_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let seeded = write_last_run(&dir, TASK_RADARR_SYNC, 10 * 60).await;

        let counter = Arc::new(AtomicUsize::new(0));
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, counting_job(counter.clone()));
        let (scheduler, _) = build(&dir, vec![spec]).await;

        scheduler.start().await;
        wait_finished_after(&scheduler, TASK_RADARR_SYNC, Some(seeded)).await;
        tokio::time::sleep(StdDuration::from_millis(200)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let task = scheduler.task(TASK_RADARR_SYNC).await.unwrap();
        assert!(task.last_execution > Some(seeded));
        assert!(task.next_execution > Utc::now() + Duration::minutes(59));

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_task_not_due_waits() {
        let dir = tempfile::tempdir().unwrap();
        let last = write_last_run(&dir, TASK_RADARR_SYNC, 10).await;

        let counter = Arc::new(AtomicUsize::new(0));
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, counting_job(counter.clone()));
        let (scheduler, _) = build(&dir, vec![spec]).await;

        scheduler.start().await;
        tokio::time::sleep(StdDuration::from_millis(200)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        let task = scheduler.task(TASK_RADARR_SYNC).await.unwrap();
        assert_eq!(task.next_execution, last + Duration::minutes(60));

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_force_unknown_task() {
        let dir = tempfile::tempdir().unwrap();
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, sleeping_job(0));
        let (scheduler, _) = build(&dir, vec![spec]).await;

        let before = scheduler.status().await.unwrap();
        let err = scheduler.force("unknown").await.unwrap_err();
        assert!(matches!(err, Error::UnknownTask(_)));
        assert_eq!(err.to_string(), "unknown task: unknown");

        let after = scheduler.status().await.unwrap();
        assert_eq!(before.tasks.len(), after.tasks.len());
        for (a, b) in before.tasks.iter().zip(after.tasks.iter()) {
            assert_eq!(a.status, b.status);
            assert_eq!(a.last_execution, b.last_execution);
        }
    }

    #[tokio::test]
    async fn test_force_is_single_flight() {
        let dir = tempfile::tempdir().unwrap();
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, sleeping_job(200));
        let (scheduler, _) = build(&dir, vec![spec]).await;

        assert_eq!(scheduler.force(TASK_RADARR_SYNC).await.unwrap(), RunOutcome::Started);
        assert_eq!(
            scheduler.force(TASK_RADARR_SYNC).await.unwrap(),
            RunOutcome::AlreadyRunning
        );
        assert_eq!(
            scheduler.task(TASK_RADARR_SYNC).await.unwrap().status,
            RunState::Running
        );

        wait_idle(&scheduler, TASK_RADARR_SYNC).await;
        assert_eq!(scheduler.force(TASK_RADARR_SYNC).await.unwrap(), RunOutcome::Started);
    }

    #[tokio::test]
    async fn test_failed_run_is_captured_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_fn(|_| async { Err(Error::Api("catalog unreachable".into())) });
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, job);
        let (scheduler, _) = build(&dir, vec![spec]).await;

        scheduler.force(TASK_RADARR_SYNC).await.unwrap();
        let task = wait_idle(&scheduler, TASK_RADARR_SYNC).await;

        assert!(task.last_error.unwrap().contains("catalog unreachable"));

        let persisted = TaskTimesFile::new(dir.path().join("times.json"))
            .load()
            .await
            .unwrap();
        assert!(persisted[0].last_execution.is_some());
        assert!(persisted[0].last_error.is_some());

        // The task stays schedulable after a failure.
        assert_eq!(scheduler.force(TASK_RADARR_SYNC).await.unwrap(), RunOutcome::Started);
    }

    #[tokio::test]
    async fn test_cancel_extras() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_fn(|cancel: CancellationToken| async move {
            cancel.cancelled().await;
            Ok(())
        });
        let spec = TaskSpec::new(TASK_EXTRAS, "Download extras", 60, job).cancellable();
        let (scheduler, _) = build(&dir, vec![spec]).await;

        assert!(!scheduler.cancel_extras().await);
        assert_eq!(scheduler.force(TASK_EXTRAS).await.unwrap(), RunOutcome::Started);
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert!(scheduler.cancel_extras().await);
        let task = wait_idle(&scheduler, TASK_EXTRAS).await;
        assert!(task.last_error.is_none());

        assert_eq!(scheduler.force(TASK_EXTRAS).await.unwrap(), RunOutcome::Started);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_status_changes_are_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let spec = TaskSpec::new(TASK_RADARR_SYNC, "Sync Radarr", 60, sleeping_job(20));
        let (scheduler, broadcaster) = build(&dir, vec![spec]).await;

        let initial = scheduler.status().await.unwrap();
        let (_id, mut rx) = broadcaster
            .subscribe(&crate::broadcast::LiveMessage::from(initial))
            .await
            .unwrap();
        rx.recv().await.unwrap();

        scheduler.force(TASK_RADARR_SYNC).await.unwrap();

        let running: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(running["type"], "task_status");
        assert_eq!(running["tasks"][0]["status"], "running");

        let idle: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(idle["tasks"][0]["status"], "idle");
    }

    #[tokio::test]
    async fn test_duplicate_task_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        let specs = vec![
            TaskSpec::new(TASK_EXTRAS, "a", 1, sleeping_job(0)),
            TaskSpec::new(TASK_EXTRAS, "b", 1, sleeping_job(0)),
        ];

        let result = Scheduler::new(
            specs,
            TaskTimesFile::new(dir.path().join("times.json")),
            Queue::new(store),
            Broadcaster::new(),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        let specs = vec![TaskSpec::new(TASK_EXTRAS, "a", u64::MAX, sleeping_job(0))];

        let result = Scheduler::new(
            specs,
            TaskTimesFile::new(dir.path().join("times.json")),
            Queue::new(store),
            Broadcaster::new(),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
