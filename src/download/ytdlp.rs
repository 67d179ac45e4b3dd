//! yt-dlp invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::fs::sanitize_path_component;
use crate::queue::ExtraRequest;

/// Maximum time a single download may take.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

static VIDEO_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id regex should compile"));

/// Fetches one extra into a directory.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `request` into `output_dir` and return the written file.
    async fn download(&self, request: &ExtraRequest, output_dir: &Path) -> Result<PathBuf>;
}

/// Check that `id` looks like a YouTube video id.
pub fn validate_video_id(id: &str) -> Result<()> {
    if !VIDEO_ID_PATTERN.is_match(id) {
        return Err(Error::InvalidVideoId(id.to_string()));
    }

    Ok(())
}

/// Watch URL for a video id.
pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// [`Downloader`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    binary: PathBuf,
    format: Option<String>,
    timeout: Duration,
}

impl YtDlpDownloader {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            format: None,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// yt-dlp format selector, e.g. `bestvideo+bestaudio/best`.
    pub fn with_format(mut self, format: Option<String>) -> Self {
        self.format = format.filter(|f| !f.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line arguments for one download.
    pub fn build_args(&self, request: &ExtraRequest, output_dir: &Path) -> Result<Vec<String>> {
        validate_video_id(&request.youtube_id)?;

        let stem = if request.extra_title.trim().is_empty() {
            request.youtube_id.clone()
        } else {
            sanitize_path_component(&request.extra_title)?
        };
        let template = output_dir.join(format!("{}.%(ext)s", stem));

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
        ];

        if let Some(format) = &self.format {
            args.push("-f".to_string());
            args.push(format.clone());
        }

        args.push(video_url(&request.youtube_id));
        Ok(args)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, request: &ExtraRequest, output_dir: &Path) -> Result<PathBuf> {
        let args = self.build_args(request, output_dir)?;
        tokio::fs::create_dir_all(output_dir).await?;

        tracing::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::YtDlpNotFound
                } else {
                    Error::Download(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Download(format!(
                    "yt-dlp timed out after {}s for {}",
                    self.timeout.as_secs(),
                    request.youtube_id
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output");
            return Err(Error::Download(format!(
                "yt-dlp exited with status {}: {}",
                output.status, reason
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let written = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.to_path_buf());

        Ok(written)
    }
}
