use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage},
    model::{
        application::ComponentInteraction,
        channel::Message,
        id::GuildId,
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{commands::Command, user_voice_channel, MusicBot};
use crate::{
    audio::{player::Enqueued, queue::PlayerStatus},
    error::PlaybackError,
    sources::Requester,
    ui::{
        buttons::{self, ControlAction},
        embeds,
    },
};

const SEARCHING_NOTICE_TTL: Duration = Duration::from_secs(5);
const HISTORY_SHOWN: usize = 10;

const NOT_IN_VOICE: &str = "You are not connected to a voice channel.";
const NOT_PLAYING: &str = "Nothing is playing right now.";
const NOT_PAUSED: &str = "Nothing is paused right now.";

/// Runs a parsed chat command.
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: Command,
    bot: &MusicBot,
) -> Result<()> {
    match command {
        Command::Join => handle_join(ctx, msg, guild_id, bot).await,
        Command::Leave => handle_leave(ctx, msg, guild_id, bot).await,
        Command::Play(query) => handle_play(ctx, msg, guild_id, &query, bot).await,
        Command::Pause => {
            let result = bot.player(guild_id).pause().await;
            reply(ctx, msg, control_reply(result, "Paused playback.", NOT_PLAYING)).await
        }
        Command::Resume => {
            let result = bot.player(guild_id).resume().await;
            reply(ctx, msg, control_reply(result, "Resumed playback.", NOT_PAUSED)).await
        }
        Command::Stop => {
            let result = bot.player(guild_id).stop().await;
            reply(ctx, msg, control_reply(result, "Stopped playback.", NOT_PLAYING)).await
        }
        Command::Skip => {
            let result = bot.player(guild_id).skip().await;
            reply(ctx, msg, control_reply(result, "Skipped.", NOT_PLAYING)).await
        }
        Command::Loop => {
            let text = match bot.player(guild_id).toggle_loop().await {
                Ok(true) => "🔁 Loop enabled.".to_string(),
                Ok(false) => "Loop disabled.".to_string(),
                Err(e) => e.user_message(),
            };
            reply(ctx, msg, text).await
        }
        Command::Queue => {
            let snapshot = bot.player(guild_id).snapshot().await?;
            send_embed(ctx, msg, embeds::queue(&snapshot)).await
        }
        Command::History => handle_history(ctx, msg, bot).await,
        Command::Help => send_embed(ctx, msg, embeds::help(&bot.config().command_prefix)).await,
    }
}

/// Maps the outcome of a pause/resume/stop/skip to its chat reply.
fn control_reply(result: Result<(), PlaybackError>, done: &str, idle: &str) -> String {
    match result {
        Ok(()) => done.to_string(),
        Err(PlaybackError::NotInVoice) | Err(PlaybackError::InvalidTransition { .. }) => idle.to_string(),
        Err(e) => e.user_message(),
    }
}

async fn reply(ctx: &Context, msg: &Message, text: impl Into<String>) -> Result<()> {
    msg.channel_id.say(&ctx.http, text).await?;
    Ok(())
}

async fn send_embed(ctx: &Context, msg: &Message, embed: serenity::builder::CreateEmbed) -> Result<()> {
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_join(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let Some((channel_id, name)) = user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(ctx, msg, NOT_IN_VOICE).await;
    };

    bot.join_voice_channel(ctx, guild_id, channel_id, msg.channel_id)
        .await?;
    reply(ctx, msg, format!("Joined {}", name)).await
}

async fn handle_leave(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    if bot.leave_voice_channel(ctx, guild_id).await? {
        reply(ctx, msg, "Disconnected.").await
    } else {
        reply(ctx, msg, "I am not in a voice channel.").await
    }
}

async fn handle_play(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    query: &str,
    bot: &MusicBot,
) -> Result<()> {
    let Some((user_channel, _)) = user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(ctx, msg, NOT_IN_VOICE).await;
    };

    if query.is_empty() {
        return reply(
            ctx,
            msg,
            format!("Usage: `{}play <query/url>`", bot.config().command_prefix),
        )
        .await;
    }

    let player = bot.player(guild_id);
    let connected = bot.current_voice_channel(ctx, guild_id).await;
    if connected.is_some_and(|channel| channel != user_channel) {
        return reply(ctx, msg, "You must be in the same voice channel as me to play music.").await;
    }
    if connected.is_none() || !player.snapshot().await?.attached {
        bot.join_voice_channel(ctx, guild_id, user_channel, msg.channel_id)
            .await?;
    }

    let searching = msg.channel_id.say(&ctx.http, "🔍 Searching...").await?;
    let http = ctx.http.clone();
    tokio::spawn(async move {
        tokio::time::sleep(SEARCHING_NOTICE_TTL).await;
        if let Err(e) = searching.delete(&http).await {
            debug!("Could not delete search notice: {:?}", e);
        }
    });

    let typing = msg.channel_id.start_typing(&ctx.http);
    let resolved = bot.resolver().resolve(query, requester(msg)).await;
    typing.stop();

    let track = match resolved {
        Ok(track) => track,
        Err(e) => {
            warn!("Resolution failed for {}: {}", query, e);
            return reply(ctx, msg, e.user_message()).await;
        }
    };

    info!("➕ {} requested {}", msg.author.name, track.title());
    match player.enqueue(track.clone()).await {
        Ok(Enqueued::Started) => Ok(()),
        Ok(Enqueued::Queued(position)) => send_embed(ctx, msg, embeds::track_added(&track, position)).await,
        Err(e) => reply(ctx, msg, e.user_message()).await,
    }
}

fn requester(msg: &Message) -> Requester {
    let name = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_else(|| msg.author.display_name().to_string());

    Requester {
        id: msg.author.id,
        name,
        avatar_url: Some(msg.author.face()),
    }
}

async fn handle_history(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    let Some(store) = bot.history() else {
        return reply(ctx, msg, "Play history is disabled.").await;
    };

    let entries = store.recent(msg.author.id.get(), HISTORY_SHOWN).await?;
    send_embed(ctx, msg, embeds::history(msg.author.display_name(), &entries)).await
}

/// Handles presses on the now-playing controls.
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };
    let Some(action) = ControlAction::from_custom_id(&component.data.custom_id) else {
        debug!("Ignoring unknown button {}", component.data.custom_id);
        return Ok(());
    };

    info!(
        "🔘 {:?} pressed by {} in guild {}",
        action, component.user.name, guild_id
    );

    let player = bot.player(guild_id);
    let needs_voice = matches!(
        action,
        ControlAction::PauseResume | ControlAction::Skip | ControlAction::Stop
    );
    if needs_voice
        && (user_voice_channel(ctx, guild_id, component.user.id).is_none()
            || bot.current_voice_channel(ctx, guild_id).await.is_none())
    {
        return respond_ephemeral(ctx, &component, "You need to be in a voice channel!").await;
    }

    match action {
        ControlAction::PauseResume => {
            let snapshot = player.snapshot().await?;
            let result = match snapshot.status {
                PlayerStatus::Playing => player.pause().await.map(|_| true),
                PlayerStatus::Paused => player.resume().await.map(|_| false),
                PlayerStatus::Idle => {
                    return respond_ephemeral(ctx, &component, "Nothing is playing!").await;
                }
            };
            match result {
                Ok(paused) => update_controls(ctx, &component, paused, snapshot.loop_enabled).await,
                Err(e) => respond_ephemeral(ctx, &component, &e.user_message()).await,
            }
        }
        ControlAction::Skip => match player.skip().await {
            Ok(()) => respond_ephemeral(ctx, &component, "Skipped ⏭").await,
            Err(_) => respond_ephemeral(ctx, &component, "Nothing is playing!").await,
        },
        ControlAction::Stop => {
            if let Err(e) = player.stop().await {
                debug!("Stop button with nothing playing: {}", e);
            }
            respond_ephemeral(ctx, &component, "Stopped ⏹").await
        }
        ControlAction::Loop => {
            let loop_enabled = player.toggle_loop().await?;
            let paused = player.snapshot().await?.status == PlayerStatus::Paused;
            update_controls(ctx, &component, paused, loop_enabled).await
        }
        ControlAction::Like => {
            respond_ephemeral(ctx, &component, "💚 **Added to your Liked Songs**").await
        }
    }
}

async fn respond_ephemeral(ctx: &Context, component: &ComponentInteraction, text: &str) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Re-renders the control row in place from the current flags.
async fn update_controls(
    ctx: &Context,
    component: &ComponentInteraction,
    paused: bool,
    loop_enabled: bool,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .components(buttons::player_controls(paused, loop_enabled)),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_replies() {
        assert_eq!(control_reply(Ok(()), "Skipped.", NOT_PLAYING), "Skipped.");
        assert_eq!(
            control_reply(Err(PlaybackError::NotInVoice), "Paused playback.", NOT_PLAYING),
            NOT_PLAYING
        );
        assert_eq!(
            control_reply(
                Err(PlaybackError::InvalidTransition {
                    action: "resume",
                    status: PlayerStatus::Playing
                }),
                "Resumed playback.",
                NOT_PAUSED
            ),
            NOT_PAUSED
        );
        assert_eq!(
            control_reply(Err(PlaybackError::PlayerGone), "Stopped playback.", NOT_PLAYING),
            "An error occurred: the player for this server stopped responding"
        );
    }
}
