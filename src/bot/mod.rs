//! # Bot Module
//!
//! Discord side of Violet Music: parses prefix commands, dispatches control
//! button presses and manages the songbird voice connection per guild.
//!
//! ## Architecture
//!
//! [`MusicBot`] implements serenity's [`EventHandler`]. It owns no playback state
//! itself; every guild is driven through its [`PlayerHandle`] from the
//! [`PlayerRegistry`], and tracks are resolved by a [`TrackResolver`] before being
//! enqueued.
//!
//! ```rust,ignore
//! let bot = MusicBot::new(config, players, resolver, history, http_client);
//! let client = Client::builder(&token, intents)
//!     .event_handler(bot)
//!     .register_songbird()
//!     .await?;
//! ```

use anyhow::Result;
use serenity::{
    all::{ActivityData, ChannelId, Context, EventHandler, GuildId, Interaction, Message, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{
        player::{PlayerHandle, PlayerRegistry},
        sink::SongbirdSink,
    },
    config::Config,
    sources::TrackResolver,
    storage::JsonHistoryStore,
};
use events::ChannelAnnouncer;

/// Main Discord event handler.
pub struct MusicBot {
    config: Arc<Config>,
    players: Arc<PlayerRegistry>,
    resolver: Arc<dyn TrackResolver>,
    history: Option<Arc<JsonHistoryStore>>,
    /// Shared HTTP client for audio streams.
    http_client: reqwest::Client,
}

impl MusicBot {
    pub fn new(
        config: Config,
        players: Arc<PlayerRegistry>,
        resolver: Arc<dyn TrackResolver>,
        history: Option<Arc<JsonHistoryStore>>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config: Arc::new(config),
            players,
            resolver,
            history,
            http_client,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn player(&self, guild_id: GuildId) -> PlayerHandle {
        self.players.get(guild_id)
    }

    pub fn resolver(&self) -> &dyn TrackResolver {
        self.resolver.as_ref()
    }

    pub fn history(&self) -> Option<&JsonHistoryStore> {
        self.history.as_deref()
    }

    /// Joins (or moves to) `channel_id` and attaches the call to the guild player.
    /// Now-playing notices go to `text_channel`.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
        text_channel: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialised"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("could not join voice channel: {e}"))?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                debug!("Could not self-deafen in guild {}: {:?}", guild_id, e);
            }
        }

        let sink = Arc::new(SongbirdSink::new(
            call,
            self.http_client.clone(),
            self.config.default_volume,
        ));
        let announcer = Arc::new(ChannelAnnouncer::new(
            ctx.http.clone(),
            text_channel,
            self.config.default_volume,
        ));
        self.player(guild_id).attach(sink, Some(announcer)).await?;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Detaches the player and leaves voice. Returns `false` if the bot wasn't connected.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<bool> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialised"))?;

        if manager.get(guild_id).is_none() {
            return Ok(false);
        }

        self.player(guild_id).detach().await?;
        manager.remove(guild_id).await?;

        info!("👋 Left voice in guild {}", guild_id);
        Ok(true)
    }

    /// Voice channel the bot is currently connected to in this guild.
    pub async fn current_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
        let manager = songbird::get(ctx).await?;
        let call = manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }
}

/// Voice channel (and its name) a user is sitting in, from the cache.
pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<(ChannelId, String)> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel_id = guild.voice_states.get(&user_id)?.channel_id?;
    let name = guild
        .channels
        .get(&channel_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| channel_id.to_string());
    Some((channel_id, name))
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(format!(
            "{}help",
            self.config.command_prefix
        ))));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        let Some(command) = commands::parse(&msg.content, &self.config.command_prefix, Some(bot_id)) else {
            return;
        };

        info!(
            "📝 {:?} from {} in guild {}",
            command, msg.author.name, guild_id
        );

        if let Err(e) = handlers::handle_command(&ctx, &msg, guild_id, command, self).await {
            error!("Error handling command: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                error!("Error handling button: {:?}", e);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id.or_else(|| old.and_then(|o| o.guild_id)) else {
            return;
        };

        // Disconnected from voice by someone else, or the connection dropped
        info!("🔌 Bot disconnected from voice in guild {}", guild_id);
        if let Some(player) = self.players.existing(guild_id) {
            if let Err(e) = player.detach().await {
                error!("Error detaching player: {:?}", e);
            }
        }
    }
}
