use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::player::PlayerRegistry;
use crate::bot::MusicBot;
use crate::config::Config;
use crate::sources::SourceManager;
use crate::storage::{HistorySink, JsonHistoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("violet_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Violet Music v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    let http_client = reqwest::Client::new();
    let sources = Arc::new(SourceManager::new(&config, http_client.clone()));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&sources).await;
    }

    match sources.verify_dependencies().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => warn!("⚠️ yt-dlp unavailable, playback will fail: {:?}", e),
    }

    let history = if config.record_history {
        Some(Arc::new(
            JsonHistoryStore::new(&config.data_dir, config.history_limit).await?,
        ))
    } else {
        info!("📁 Play history disabled");
        None
    };
    let history_sink = history
        .clone()
        .map(|store| store as Arc<dyn HistorySink>);
    let players = Arc::new(PlayerRegistry::new(config.max_queue_size, history_sink));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = MusicBot::new(config.clone(), players, sources, history, http_client);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(sources: &SourceManager) -> Result<()> {
    let version = sources.verify_dependencies().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
