//! Download module for extras.
//!
//! This module provides:
//! - The wanted-extras source
//! - yt-dlp based downloading
//! - The scheduled extras task

pub mod extras;
pub mod wanted;
pub mod ytdlp;

pub use extras::{ExtrasJob, ExtrasSummary};
pub use wanted::{StoreWantedSource, WantedSource, WANTED_KEY};
pub use ytdlp::{validate_video_id, Downloader, YtDlpDownloader};
