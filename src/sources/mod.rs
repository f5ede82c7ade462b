pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{fmt, time::Duration};
use tracing::{info, warn};
use url::Url;

pub use spotify::SpotifyScraper;
pub use ytdlp::YtDlpClient;

use crate::{config::Config, error::PlaybackError};

/// Converts a user query into playable track metadata.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requester: Requester) -> Result<Track, PlaybackError>;
}

/// Who asked for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A resolved, immutable track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    stream_url: String,
    page_url: String,
    duration: Option<Duration>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    platform: Platform,
    requester: Requester,
}

impl Track {
    pub fn new(
        title: String,
        stream_url: String,
        page_url: String,
        platform: Platform,
        requester: Requester,
    ) -> Self {
        Self {
            title,
            stream_url,
            page_url,
            duration: None,
            uploader: None,
            thumbnail: None,
            platform,
            requester,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
    pub fn page_url(&self) -> &str {
        &self.page_url
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn platform(&self) -> Platform {
        self.platform
    }
    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    // Builders
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_uploader(mut self, uploader: String) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

/// Where a query points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Spotify,
    SoundCloud,
    Other,
}

impl Platform {
    /// Classifies a query. Plain text is a YouTube search.
    pub fn detect(query: &str) -> Self {
        let Ok(url) = Url::parse(query.trim()) else {
            return Platform::YouTube;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Platform::YouTube;
        }

        let host = url.host_str().unwrap_or_default().trim_start_matches("www.");
        match host {
            "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be" => {
                Platform::YouTube
            }
            "open.spotify.com" | "spotify.com" => Platform::Spotify,
            "soundcloud.com" | "m.soundcloud.com" | "on.soundcloud.com" => Platform::SoundCloud,
            _ => Platform::Other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::YouTube => "YouTube",
            Platform::Spotify => "Spotify",
            Platform::SoundCloud => "SoundCloud",
            Platform::Other => "Web",
        })
    }
}

fn is_url(query: &str) -> bool {
    let query = query.trim();
    query.starts_with("http://") || query.starts_with("https://")
}

/// Routes queries to the right extractor.
pub struct SourceManager {
    ytdlp: YtDlpClient,
    spotify: SpotifyScraper,
}

impl SourceManager {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            ytdlp: YtDlpClient::new(config),
            spotify: SpotifyScraper::new(http),
        }
    }

    pub async fn verify_dependencies(&self) -> anyhow::Result<String> {
        self.ytdlp.version().await
    }

    /// Turns the user query into something yt-dlp understands.
    async fn extraction_target(&self, query: &str, platform: Platform) -> String {
        let query = query.trim();
        let spotify_search = if platform == Platform::Spotify {
            match self.spotify.search_query(query).await {
                Ok(search) => {
                    info!("🟢 Spotify link mapped to search: {}", search);
                    Some(search)
                }
                Err(e) => {
                    warn!("Spotify extraction failed for {}: {:?}", query, e);
                    None
                }
            }
        } else {
            None
        };

        target_for(query, platform, spotify_search.as_deref())
    }
}

/// What yt-dlp is asked to extract. A Spotify link whose page could not be
/// scraped is passed through untouched.
fn target_for(query: &str, platform: Platform, spotify_search: Option<&str>) -> String {
    let query = query.trim();
    match (platform, spotify_search) {
        (Platform::Spotify, Some(search)) => format!("ytsearch1:{search}"),
        _ if is_url(query) => query.to_string(),
        _ => format!("ytsearch1:{query}"),
    }
}

#[async_trait]
impl TrackResolver for SourceManager {
    async fn resolve(&self, query: &str, requester: Requester) -> Result<Track, PlaybackError> {
        let platform = Platform::detect(query);
        let target = self.extraction_target(query, platform).await;

        let info = self
            .ytdlp
            .extract(&target)
            .await
            .map_err(|e| PlaybackError::resolution(query, format!("{e:#}")))?;

        info.into_track(query, platform, requester)
            .ok_or_else(|| PlaybackError::resolution(query, "no playable stream found"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_platforms() {
        assert_eq!(
            Platform::detect("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Platform::YouTube
        );
        assert_eq!(Platform::detect("https://youtu.be/dQw4w9WgXcQ"), Platform::YouTube);
        assert_eq!(
            Platform::detect("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"),
            Platform::Spotify
        );
        assert_eq!(
            Platform::detect("https://soundcloud.com/artist/song"),
            Platform::SoundCloud
        );
        assert_eq!(
            Platform::detect("https://example.com/song.mp3"),
            Platform::Other
        );
        assert_eq!(Platform::detect("lofi hip hop radio"), Platform::YouTube);
    }

    #[test]
    fn url_check_ignores_surrounding_whitespace() {
        assert!(is_url("  https://example.com/a.mp3 "));
        assert!(!is_url("ytsearch1:song"));
    }

    #[test]
    fn routes_queries_to_extraction_targets() {
        assert_eq!(
            target_for("  lofi hip hop ", Platform::YouTube, None),
            "ytsearch1:lofi hip hop"
        );
        assert_eq!(
            target_for(" https://example.com/song.mp3 ", Platform::Other, None),
            "https://example.com/song.mp3"
        );
        assert_eq!(
            target_for("https://youtu.be/dQw4w9WgXcQ", Platform::YouTube, None),
            "https://youtu.be/dQw4w9WgXcQ"
        );

        let spotify = "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC";
        assert_eq!(
            target_for(spotify, Platform::Spotify, Some("Never Gonna Give You Up Rick Astley")),
            "ytsearch1:Never Gonna Give You Up Rick Astley"
        );
        assert_eq!(target_for(spotify, Platform::Spotify, None), spotify);
    }

    #[test]
    fn platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::SoundCloud).unwrap();
        assert_eq!(json, "\"soundcloud\"");
    }
}
