//! Command-line argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::scheduler::{TASK_EXTRAS, TASK_RADARR_SYNC, TASK_SONARR_SYNC};

/// Extras downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "extras-downloader",
    version,
    about = "Sync Radarr/Sonarr libraries and download missing extras",
    long_about = "A background service that periodically syncs Radarr and Sonarr catalogs,\n\
                  downloads wanted trailers and other extras with yt-dlp, and streams\n\
                  queue and task status to websocket clients."
)]
pub struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml", env = "EXTRAS_CONFIG")]
    pub config: PathBuf,

    /// Write a default configuration file to --config and exit.
    #[arg(long)]
    pub init_config: bool,

    /// Directory for the store and state files.
    #[arg(long = "data-dir", env = "EXTRAS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Root directory for downloaded extras.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Websocket listen address (host:port).
    #[arg(short, long, env = "EXTRAS_LISTEN")]
    pub listen: Option<String>,

    /// Radarr base URL.
    #[arg(long = "radarr-url", env = "RADARR_URL")]
    pub radarr_url: Option<String>,

    /// Radarr API key. Enables Radarr sync.
    #[arg(long = "radarr-api-key", env = "RADARR_API_KEY")]
    pub radarr_api_key: Option<String>,

    /// Sonarr base URL.
    #[arg(long = "sonarr-url", env = "SONARR_URL")]
    pub sonarr_url: Option<String>,

    /// Sonarr API key. Enables Sonarr sync.
    #[arg(long = "sonarr-api-key", env = "SONARR_API_KEY")]
    pub sonarr_api_key: Option<String>,

    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp", env = "YTDLP_PATH")]
    pub ytdlp_path: Option<PathBuf>,

    /// Seconds to wait between downloads.
    #[arg(long)]
    pub throttle: Option<u64>,

    /// Run a single task once and exit instead of serving.
    #[arg(long, value_enum)]
    pub run_once: Option<TaskArg>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

/// CLI task argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskArg {
    /// Sync the Radarr library.
    RadarrSync,
    /// Sync the Sonarr library.
    SonarrSync,
    /// Download wanted extras.
    Extras,
}

impl TaskArg {
    /// Scheduler task id.
    pub fn task_id(&self) -> &'static str {
        match self {
            TaskArg::RadarrSync => TASK_RADARR_SYNC,
            TaskArg::SonarrSync => TASK_SONARR_SYNC,
            TaskArg::Extras => TASK_EXTRAS,
        }
    }
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.general.data_dir = Some(dir.clone());
        }

        if let Some(dir) = &self.output_dir {
            config.download.output_dir = Some(dir.clone());
        }

        if let Some(listen) = &self.listen {
            config.general.listen_addr = listen.clone();
        }

        // Catalog settings: an API key on the command line enables the catalog
        if let Some(url) = &self.radarr_url {
            config.radarr.url = url.clone();
        }

        if let Some(key) = &self.radarr_api_key {
            config.radarr.api_key = key.clone();
            config.radarr.enabled = true;
        }

        if let Some(url) = &self.sonarr_url {
            config.sonarr.url = url.clone();
        }

        if let Some(key) = &self.sonarr_api_key {
            config.sonarr.api_key = key.clone();
            config.sonarr.enabled = true;
        }

        // Download settings
        if let Some(path) = &self.ytdlp_path {
            config.download.ytdlp_path = path.clone();
        }

        if let Some(throttle) = self.throttle {
            config.download.throttle_seconds = throttle;
        }
    }
}
