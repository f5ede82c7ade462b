use anyhow::{Context, Result};
use async_process::Command;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{Platform, Requester, Track};
use crate::config::Config;

/// Runs yt-dlp as an external process to extract stream metadata.
pub struct YtDlpClient {
    binary: String,
    cookies_file: PathBuf,
    timeout: Duration,
    // Limit concurrent extractions to avoid rate limiting
    rate_limiter: Semaphore,
}

/// The subset of yt-dlp's JSON output we use.
#[derive(Debug, Deserialize)]
pub struct YtDlpInfo {
    pub title: Option<String>,
    pub url: Option<String>,
    pub webpage_url: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    /// Search results and playlists come back wrapped; take the first real entry.
    pub fn first_entry(self) -> Option<YtDlpInfo> {
        match self.entries {
            Some(entries) => entries.into_iter().flatten().next(),
            None => Some(self),
        }
    }

    pub fn into_track(self, query: &str, platform: Platform, requester: Requester) -> Option<Track> {
        let info = self.first_entry()?;
        let stream_url = info.url.filter(|u| !u.is_empty())?;
        let page_url = info.webpage_url.unwrap_or_else(|| query.trim().to_string());
        let title = info.title.unwrap_or_else(|| page_url.clone());

        let mut track = Track::new(title, stream_url, page_url, platform, requester);
        if let Some(secs) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
            track = track.with_duration(Duration::from_secs(secs as u64));
        }
        if let Some(uploader) = info.uploader {
            track = track.with_uploader(uploader);
        }
        if let Some(thumbnail) = info.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        Some(track)
    }
}

impl YtDlpClient {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            cookies_file: config.cookies_file.clone(),
            timeout: config.resolve_timeout,
            rate_limiter: Semaphore::new(config.max_concurrent_resolves),
        }
    }

    fn args(&self, target: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--no-playlist",
            "--format",
            "bestaudio/best",
            "--force-ipv4",
            "--no-check-certificates",
            "--quiet",
            "--no-warnings",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.cookies_file.exists() {
            debug!("🍪 Using cookies from {}", self.cookies_file.display());
            args.push("--cookies".to_string());
            args.push(self.cookies_file.display().to_string());
        }

        args.push(target.to_string());
        args
    }

    /// Extracts metadata for a URL or `ytsearch1:` query.
    pub async fn extract(&self, target: &str) -> Result<YtDlpInfo> {
        let _permit = self.rate_limiter.acquire().await?;

        info!("🔍 Resolving: {}", target);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args(self.args(target))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))?
        .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout).context("failed to parse yt-dlp output")
    }

    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp exited with {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
