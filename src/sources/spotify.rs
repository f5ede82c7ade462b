use anyhow::{Context, Result};
use regex::Regex;
use std::{sync::OnceLock, time::Duration};
use tracing::debug;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Spotify pages can't be streamed, so we read the track name from the page
/// and search YouTube for it instead.
pub struct SpotifyScraper {
    http: reqwest::Client,
}

impl SpotifyScraper {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetches the page and returns a search string like `Song - Song by Artist`.
    pub async fn search_query(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Spotify request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Spotify returned {}", response.status());
        }

        let html = response.text().await?;
        debug!("📄 Spotify page fetched ({} bytes)", html.len());

        search_query_from_html(&html).ok_or_else(|| anyhow::anyhow!("no <title> in Spotify page"))
    }
}

fn title_regex() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"))
}

pub fn search_query_from_html(html: &str) -> Option<String> {
    let raw = title_regex().captures(html)?.get(1)?.as_str();
    let title = decode_entities(raw.trim());
    let query = title.trim_end_matches(" | Spotify").trim();

    if query.is_empty() || query.eq_ignore_ascii_case("spotify") {
        None
    } else {
        Some(query.to_string())
    }
}

fn decode_entities(text: &str) -> String {
    // `&amp;` goes last so `&amp;quot;` stays `&quot;`.
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_song_from_page_title() {
        let html = r#"<html><head><meta charset="utf-8"><title>Never Gonna Give You Up - song and lyrics by Rick Astley | Spotify</title></head></html>"#;
        assert_eq!(
            search_query_from_html(html).as_deref(),
            Some("Never Gonna Give You Up - song and lyrics by Rick Astley")
        );
    }

    #[test]
    fn decodes_html_entities() {
        let html = "<TITLE>Rock &amp; Roll Ain&#x27;t Noise Pollution | Spotify</TITLE>";
        assert_eq!(
            search_query_from_html(html).as_deref(),
            Some("Rock & Roll Ain't Noise Pollution")
        );
    }

    #[test]
    fn escaped_ampersands_are_decoded_once() {
        assert_eq!(decode_entities("say &amp;quot;hi&amp;quot;"), "say &quot;hi&quot;");
        assert_eq!(decode_entities("&amp;lt;3 &lt;3"), "&lt;3 <3");
    }

    #[test]
    fn bare_spotify_title_is_useless() {
        assert_eq!(search_query_from_html("<title>Spotify</title>"), None);
        assert_eq!(search_query_from_html("<html></html>"), None);
    }
}
