//! Configuration structures and loading logic.

use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default = "default_radarr")]
    pub radarr: ArrConfig,

    #[serde(default = "default_sonarr")]
    pub sonarr: ArrConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            radarr: default_radarr(),
            sonarr: default_sonarr(),
            schedule: ScheduleConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for the store, task times and queue export.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Address the live-update websocket listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            listen_addr: default_listen_addr(),
        }
    }
}

/// Connection to a Radarr or Sonarr instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL, e.g. `http://localhost:7878`.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    /// Mark trailers reported by the catalog as wanted.
    #[serde(default = "default_true")]
    pub want_trailers: bool,
}

impl Default for ArrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            want_trailers: true,
        }
    }
}

/// Task intervals, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sync_minutes")]
    pub radarr_sync_minutes: u64,

    #[serde(default = "default_sync_minutes")]
    pub sonarr_sync_minutes: u64,

    #[serde(default = "default_extras_minutes")]
    pub extras_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            radarr_sync_minutes: default_sync_minutes(),
            sonarr_sync_minutes: default_sync_minutes(),
            extras_minutes: default_extras_minutes(),
        }
    }
}

/// Extras download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for downloaded extras.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Path or name of the yt-dlp executable.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// yt-dlp format selector.
    #[serde(default)]
    pub format: Option<String>,

    /// Seconds to wait between two downloads.
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: u64,

    /// Minutes a single download may take.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,

    /// Queue history entries kept after each extras run; 0 keeps everything.
    #[serde(default = "default_queue_history_limit")]
    pub queue_history_limit: usize,

    /// Milliseconds between checks of the queue export file.
    #[serde(default = "default_watch_poll_ms")]
    pub watch_poll_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            ytdlp_path: default_ytdlp_path(),
            format: None,
            throttle_seconds: default_throttle_seconds(),
            timeout_minutes: default_timeout_minutes(),
            queue_history_limit: default_queue_history_limit(),
            watch_poll_ms: default_watch_poll_ms(),
        }
    }
}

impl DownloadConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8765".to_string()
}

fn default_radarr() -> ArrConfig {
    ArrConfig {
        url: "http://localhost:7878".to_string(),
        ..ArrConfig::default()
    }
}

fn default_sonarr() -> ArrConfig {
    ArrConfig {
        url: "http://localhost:8989".to_string(),
        ..ArrConfig::default()
    }
}

fn default_true() -> bool {
    true
}

fn default_sync_minutes() -> u64 {
    60
}

fn default_extras_minutes() -> u64 {
    120
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_throttle_seconds() -> u64 {
    5
}

fn default_timeout_minutes() -> u64 {
    30
}

fn default_queue_history_limit() -> usize {
    1000
}

fn default_watch_poll_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one with --init-config",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.general.data_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", "extras-downloader")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("data"))
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("store.redb")
    }

    pub fn task_times_path(&self) -> PathBuf {
        self.data_dir().join("task_times.json")
    }

    /// Exported queue snapshot read by the watcher.
    pub fn queue_file(&self) -> PathBuf {
        self.data_dir().join("download_queue.json")
    }

    /// Get the effective extras output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.download
            .output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("extras"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.general.listen_addr, "127.0.0.1:8765");
        assert_eq!(config.radarr.url, "http://localhost:7878");
        assert_eq!(config.sonarr.url, "http://localhost:8989");
        assert!(!config.radarr.enabled);
        assert_eq!(config.schedule.extras_minutes, 120);
        assert_eq!(config.download.ytdlp_path, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [general]
            data_dir = "/var/lib/extras"

            [radarr]
            enabled = true
            api_key = "0123456789abcdef0123456789abcdef"

            [download]
            throttle_seconds = 0
            "#,
        )
        .unwrap();

        assert!(config.radarr.enabled);
        // Fields missing inside a present section fall back to field defaults.
        assert_eq!(config.radarr.url, "");
        assert!(config.radarr.want_trailers);
        assert_eq!(config.download.throttle(), Duration::ZERO);
        assert_eq!(
            config.store_path(),
            PathBuf::from("/var/lib/extras/store.redb")
        );
        assert_eq!(
            config.output_dir(),
            PathBuf::from("/var/lib/extras/extras")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.schedule.radarr_sync_minutes = 15;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.schedule.radarr_sync_minutes, 15);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
