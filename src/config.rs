use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Resolution
    pub resolve_timeout: Duration,
    pub max_concurrent_resolves: usize,
    pub ytdlp_path: String,
    pub cookies_file: PathBuf,

    // History
    pub data_dir: PathBuf,
    pub record_history: bool,
    pub history_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("DEFAULT_VOLUME must be a number")?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE must be an integer")?,

            // Resolution
            resolve_timeout: match std::env::var("RESOLVE_TIMEOUT") {
                Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())
                    .context("RESOLVE_TIMEOUT must be a duration such as `30s`")?,
                _ => defaults.resolve_timeout,
            },
            max_concurrent_resolves: std::env::var("MAX_CONCURRENT_RESOLVES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_CONCURRENT_RESOLVES must be an integer")?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            cookies_file: std::env::var("COOKIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cookies_file),

            // History
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            record_history: std::env::var("RECORD_HISTORY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("RECORD_HISTORY must be `true` or `false`")?,
            history_limit: std::env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .context("HISTORY_LIMIT must be an integer")?,
        };

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("cannot create {}", config.data_dir.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks that catch common mistakes before the bot connects.
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_concurrent_resolves == 0 {
            anyhow::bail!("Max concurrent resolves must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.history_limit == 0 {
            anyhow::bail!("History limit must be greater than 0");
        }

        Ok(())
    }

    /// Loggable summary without the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix `{}`\n  \
            Audio: {}% vol, {} queue limit\n  \
            Resolver: {} ({} concurrent, {} timeout)\n  \
            History: {} (limit {} per user) in {}",
            self.command_prefix,
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.ytdlp_path,
            self.max_concurrent_resolves,
            humantime::format_duration(self.resolve_timeout),
            if self.record_history { "on" } else { "off" },
            self.history_limit,
            self.data_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            default_volume: 0.5,
            max_queue_size: 100,

            resolve_timeout: Duration::from_secs(30),
            max_concurrent_resolves: 3,
            ytdlp_path: "yt-dlp".to_string(),
            cookies_file: "cookies.txt".into(),

            data_dir: "./data".into(),
            record_history: true,
            history_limit: 200,
        }
    }
}
