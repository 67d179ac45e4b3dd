//! Extras Downloader - service entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use extras_downloader::{
    broadcast::Broadcaster,
    catalog::{ArrClient, CatalogKind, CatalogSyncJob},
    cli::Args,
    config::{validate_config, Config},
    download::{ExtrasJob, StoreWantedSource, YtDlpDownloader},
    error::{exit_codes, Error, Result},
    live::LiveServer,
    output::{
        print_banner, print_config_summary, print_error, print_info, print_success,
        print_task_summary, print_warning,
    },
    queue::{Queue, QueueWatcher},
    scheduler::{
        RunOutcome, RunState, Scheduler, TaskSpec, TaskTimesFile, TASK_EXTRAS, TASK_RADARR_SYNC,
        TASK_SONARR_SYNC,
    },
    store::Store,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::TaskFailed { .. }
                | Error::TaskAlreadyRunning(_)
                | Error::Cancelled(_)
                | Error::UnknownTask(_) => ExitCode::from(exit_codes::TASK_ERROR as u8),
                Error::Storage(_) | Error::Io(_) => ExitCode::from(exit_codes::STORAGE_ERROR as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    if args.init_config {
        if args.config.exists() {
            return Err(Error::Config(format!(
                "Refusing to overwrite existing {}",
                args.config.display()
            )));
        }
        Config::default().save(&args.config)?;
        print_success(&format!("Wrote {}", args.config.display()));
        return Ok(());
    }

    print_banner();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            args.config.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    args.merge_into_config(&mut config);
    validate_config(&config)?;
    print_config_summary(&config);

    // Open persistent state
    let store = Store::open(&config.store_path())?;
    let queue = Queue::new(store.clone()).with_export(config.queue_file());

    let stale = queue.fail_stale("interrupted by restart").await?;
    if stale > 0 {
        print_warning(&format!("{} interrupted download(s) marked as failed", stale));
    }
    queue.export().await?;

    let broadcaster = Broadcaster::new();
    let shutdown = CancellationToken::new();

    let scheduler = Scheduler::new(
        build_tasks(&config, &store, &queue)?,
        TaskTimesFile::new(config.task_times_path()),
        queue,
        broadcaster.clone(),
        shutdown.clone(),
    )
    .await?;

    if let Some(task) = args.run_once {
        return run_once(&scheduler, task.task_id()).await;
    }

    print_task_summary(&scheduler.status().await?.tasks);

    // Start serving
    let server = LiveServer::bind(
        &config.general.listen_addr,
        scheduler.clone(),
        broadcaster.clone(),
    )
    .await?;

    let mut handles = scheduler.start().await;
    handles.push(tokio::spawn(server.serve(shutdown.clone())));

    let watcher = QueueWatcher::new(config.queue_file())
        .with_poll_interval(config.download.watch_poll_interval());
    let watch_broadcaster = broadcaster.clone();
    handles.push(tokio::spawn(watcher.run(shutdown.clone(), move |changed| {
        let broadcaster = watch_broadcaster.clone();
        async move {
            broadcaster.broadcast_queue(changed).await;
        }
    })));

    print_success("Service started. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    print_info("Shutting down...");

    scheduler.stop().await;
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Register the catalog syncs that are enabled plus the extras task.
fn build_tasks(config: &Config, store: &Store, queue: &Queue) -> Result<Vec<TaskSpec>> {
    let wanted = StoreWantedSource::new(store.clone());
    let mut specs = Vec::new();

    let catalogs = [
        (
            CatalogKind::Radarr,
            &config.radarr,
            TASK_RADARR_SYNC,
            "Sync Radarr",
            config.schedule.radarr_sync_minutes,
        ),
        (
            CatalogKind::Sonarr,
            &config.sonarr,
            TASK_SONARR_SYNC,
            "Sync Sonarr",
            config.schedule.sonarr_sync_minutes,
        ),
    ];

    for (kind, arr, id, label, minutes) in catalogs {
        if !arr.enabled {
            continue;
        }

        let client = ArrClient::new(kind, &arr.url, arr.api_key.clone())?;
        let mut job = CatalogSyncJob::new(client, store.clone());
        if arr.want_trailers {
            job = job.with_trailers(wanted.clone());
        }
        specs.push(TaskSpec::new(id, label, minutes, Arc::new(job)));
    }

    let downloader = YtDlpDownloader::new(config.download.ytdlp_path.clone())
        .with_format(config.download.format.clone())
        .with_timeout(config.download.timeout());

    let extras = ExtrasJob::new(
        queue.clone(),
        Arc::new(wanted),
        Arc::new(downloader),
        config.output_dir(),
    )
    .with_throttle(config.download.throttle())
    .with_history_limit(config.download.queue_history_limit);

    specs.push(
        TaskSpec::new(
            TASK_EXTRAS,
            "Download extras",
            config.schedule.extras_minutes,
            Arc::new(extras),
        )
        .cancellable(),
    );

    Ok(specs)
}

/// Force one task, wait for it and report its outcome.
async fn run_once(scheduler: &Scheduler, task_id: &str) -> Result<()> {
    print_info(&format!("Running task {}", task_id));

    match scheduler.force(task_id).await? {
        RunOutcome::Started => {}
        RunOutcome::AlreadyRunning => return Err(Error::TaskAlreadyRunning(task_id.to_string())),
        RunOutcome::Aborted => return Err(Error::Cancelled(task_id.to_string())),
    }

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;

        let task = scheduler
            .task(task_id)
            .await
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;
        if task.status == RunState::Running {
            continue;
        }

        return match task.last_error {
            Some(message) => Err(Error::TaskFailed {
                task: task_id.to_string(),
                message,
            }),
            None => {
                print_success(&format!(
                    "Task {} finished in {:.1}s",
                    task_id, task.last_duration
                ));
                Ok(())
            }
        };
    }
}
