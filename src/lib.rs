//! Extras Downloader - trailers and extras for Radarr and Sonarr libraries
//!
//! This library provides a background service that keeps media libraries
//! supplied with trailers and other extras.
//!
//! # Features
//!
//! - Embedded store with scalar, hash and list containers
//! - Recurring task scheduler with persisted run times and catch-up
//! - Single-flight task execution and a cancellable extras task
//! - Append-only download queue with dedup and diffing
//! - Live queue and task updates over a websocket
//! - Radarr/Sonarr catalog sync
//! - yt-dlp based downloads
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use extras_downloader::{Broadcaster, Config, Queue, Scheduler, Store, TaskTimesFile};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let store = Store::open(&config.store_path())?;
//!     let queue = Queue::new(store).with_export(config.queue_file());
//!
//!     let scheduler = Scheduler::new(
//!         Vec::new(),
//!         TaskTimesFile::new(config.task_times_path()),
//!         queue,
//!         Broadcaster::new(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!
//!     println!("{:?}", scheduler.status().await?);
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod live;
pub mod output;
pub mod queue;
pub mod scheduler;
pub mod store;

// Re-exports for convenience
pub use broadcast::{Broadcaster, LiveMessage};
pub use catalog::{ArrClient, CatalogKind, CatalogSyncJob};
pub use config::Config;
pub use download::{ExtrasJob, StoreWantedSource, YtDlpDownloader};
pub use error::{Error, Result};
pub use queue::{ExtraRequest, MediaType, Queue, QueueWatcher, Record, Status};
pub use scheduler::{Job, RunOutcome, Scheduler, TaskSpec, TaskTimesFile};
pub use store::Store;
