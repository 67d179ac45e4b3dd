//! End-to-end tests across store, queue, scheduler and live updates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use extras_downloader::broadcast::LiveMessage;
use extras_downloader::download::{Downloader, ExtrasJob, StoreWantedSource};
use extras_downloader::queue::{dedup, diff};
use extras_downloader::scheduler::{RunState, TaskTimesFile, TASK_EXTRAS};
use extras_downloader::{
    Broadcaster, ExtraRequest, MediaType, Queue, QueueWatcher, Record, RunOutcome, Scheduler,
    Status, Store, TaskSpec,
};

struct FakeDownloader;

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        request: &ExtraRequest,
        output_dir: &Path,
    ) -> extras_downloader::Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(format!("{}.mp4", request.youtube_id));
        tokio::fs::write(&path, b"video").await?;
        Ok(path)
    }
}

fn request(id: &str, title: &str) -> ExtraRequest {
    ExtraRequest {
        youtube_id: id.to_string(),
        media_type: MediaType::Movie,
        media_id: 1,
        media_title: title.to_string(),
        extra_type: "Trailers".to_string(),
        extra_title: format!("{} Trailer", title),
    }
}

#[test]
fn test_store_list_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("store.redb")).unwrap();

    for value in ["a", "b", "c", "d", "e"] {
        store.rpush("l", value.as_bytes()).unwrap();
    }

    assert_eq!(
        store.lrange("l", 1, 3).unwrap(),
        vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
    );
    assert_eq!(store.lrange("l", -2, -1).unwrap().len(), 2);
    assert!(store.lrange("l", 4, 2).unwrap().is_empty());

    store.rpush("l", b"a").unwrap();
    assert_eq!(store.lrem("l", 0, b"a").unwrap(), 0);
    assert_eq!(store.lrem("l", 5, b"a").unwrap(), 2);
    assert_eq!(store.llen("l").unwrap(), 4);

    store.ltrim("l", 2, 1).unwrap();
    assert_eq!(store.llen("l").unwrap(), 0);

    assert!(store.get("missing").unwrap_err().is_not_found());
}

#[test]
fn test_dedup_and_diff_contract() {
    let first = Record::queued(request("aaaaaaaaaaa", "Heat"));
    let running = first.start();
    let records = vec![first.clone(), running.clone()];

    let current = dedup(&records);
    assert_eq!(current, vec![running.clone()]);
    assert_eq!(dedup(&current), current);
    assert!(diff(&current, &current).is_empty());
    assert_eq!(diff(&[first], &current), vec![running]);
}

#[tokio::test]
async fn test_extras_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("store.redb")).unwrap();
    let queue_file = dir.path().join("download_queue.json");
    let queue = Queue::new(store.clone()).with_export(queue_file.clone());

    let wanted = StoreWantedSource::new(store.clone());
    wanted.add(&request("aaaaaaaaaaa", "Heat")).unwrap();
    wanted.add(&request("bbbbbbbbbbb", "Ronin")).unwrap();

    let extras = ExtrasJob::new(
        queue.clone(),
        Arc::new(wanted),
        Arc::new(FakeDownloader),
        dir.path().join("media"),
    )
    .with_throttle(Duration::ZERO);

    let broadcaster = Broadcaster::new();
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        vec![TaskSpec::new(TASK_EXTRAS, "Download extras", 60, Arc::new(extras)).cancellable()],
        TaskTimesFile::new(dir.path().join("task_times.json")),
        queue.clone(),
        broadcaster.clone(),
        shutdown.clone(),
    )
    .await
    .unwrap();

    let initial = LiveMessage::from(scheduler.status().await.unwrap());
    let (_id, mut rx) = broadcaster.subscribe(&initial).await.unwrap();

    let watcher = QueueWatcher::new(queue_file).with_poll_interval(Duration::from_millis(20));
    let watch_broadcaster = broadcaster.clone();
    let watch_task = tokio::spawn(watcher.run(shutdown.clone(), move |changed| {
        let broadcaster = watch_broadcaster.clone();
        async move {
            broadcaster.broadcast_queue(changed).await;
        }
    }));

    assert_eq!(scheduler.force(TASK_EXTRAS).await.unwrap(), RunOutcome::Started);

    let mut finished = false;
    for _ in 0..300 {
        let task = scheduler.task(TASK_EXTRAS).await.unwrap();
        if task.status == RunState::Idle && task.last_execution.is_some() {
            assert!(task.last_error.is_none());
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(finished);

    // Both extras ended up on disk and in the queue as done.
    let current = queue.current().unwrap();
    assert_eq!(current.len(), 2);
    assert!(current.iter().all(|r| r.status == Status::Done));
    assert!(dir
        .path()
        .join("media/Heat/Trailers/aaaaaaaaaaa.mp4")
        .exists());

    // Observers converge on the final queue state through the watcher.
    let mut saw_done = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !saw_done {
        let message = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&message).unwrap();
        if json["type"] == "download_queue_update" {
            saw_done = json["queue"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r["status"] == "done");
        }
    }

    // Run times were persisted.
    let times = TaskTimesFile::new(dir.path().join("task_times.json"))
        .load()
        .await
        .unwrap();
    assert!(times[0].last_execution.is_some());

    // A second run has nothing left to do.
    assert_eq!(scheduler.force(TASK_EXTRAS).await.unwrap(), RunOutcome::Started);

    scheduler.stop().await;
    watch_task.await.unwrap();
}
