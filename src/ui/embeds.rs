use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::queue::{PlaybackSnapshot, PlayerStatus},
    bot::commands::COMMANDS,
    sources::Track,
    storage::HistoryEntry,
};

/// Colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Violet Music";

/// Entries shown by the queue embed before collapsing into "and N more".
const QUEUE_PREVIEW: usize = 10;

fn requested_by(track: &Track) -> CreateEmbedFooter {
    let requester = track.requester();
    let footer = CreateEmbedFooter::new(format!("Requested by {}", requester.name));
    match &requester.avatar_url {
        Some(avatar) => footer.icon_url(avatar),
        None => footer,
    }
}

fn linked_title(track: &Track) -> String {
    format!("[{}]({})", track.title(), track.page_url())
}

/// The message posted whenever a track starts.
pub fn now_playing(track: &Track, volume: f32) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("Now Playing")
        .description(format!(
            "{}\n{}",
            linked_title(track),
            track.uploader().unwrap_or("Unknown Artist")
        ))
        .color(colors::MUSIC_PURPLE);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(duration) = track.duration() {
        embed = embed.field("Duration", format_duration(duration), true);
    }

    embed
        .field("Volume", format!("{}%", (volume * 100.0).round() as u32), true)
        .field("Source", track.platform().to_string(), true)
        .footer(requested_by(track))
}

pub fn track_added(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("Added to Queue")
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("Position", format!("#{}", position), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("Duration", format_duration(duration), true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed.footer(requested_by(track))
}

pub fn queue(snapshot: &PlaybackSnapshot) -> CreateEmbed {
    let now = match (&snapshot.current, snapshot.status) {
        (Some(track), PlayerStatus::Paused) => format!("⏸ {}", linked_title(track)),
        (Some(track), _) => format!("▶ {}", linked_title(track)),
        (None, _) => "Nothing is playing right now.".to_string(),
    };

    let mut upcoming: Vec<String> = snapshot
        .pending
        .iter()
        .take(QUEUE_PREVIEW)
        .enumerate()
        .map(|(i, track)| match track.duration() {
            Some(d) => format!("`{}.` {} `{}`", i + 1, track.title(), format_duration(d)),
            None => format!("`{}.` {}", i + 1, track.title()),
        })
        .collect();
    if snapshot.pending.len() > QUEUE_PREVIEW {
        upcoming.push(format!("… and {} more", snapshot.pending.len() - QUEUE_PREVIEW));
    }
    let upcoming = if upcoming.is_empty() {
        "The queue is empty.".to_string()
    } else {
        upcoming.join("\n")
    };

    CreateEmbed::default()
        .title("Queue")
        .color(colors::MUSIC_PURPLE)
        .field("Now", now, false)
        .field("Up next", upcoming, false)
        .field("Tracks", snapshot.pending.len().to_string(), true)
        .field("Length", format_duration(snapshot.pending_duration()), true)
        .field("Loop", if snapshot.loop_enabled { "On" } else { "Off" }, true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn history(user_name: &str, entries: &[HistoryEntry]) -> CreateEmbed {
    let description = if entries.is_empty() {
        "No plays recorded yet.".to_string()
    } else {
        entries
            .iter()
            .map(|e| {
                format!(
                    "<t:{}:R> [{}]({}) · {}",
                    e.played_at.timestamp(),
                    e.title,
                    e.url,
                    e.platform
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    CreateEmbed::default()
        .title(format!("Recently played by {}", user_name))
        .description(description)
        .color(colors::NEUTRAL_GRAY)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn help(prefix: &str) -> CreateEmbed {
    COMMANDS.iter().fold(
        CreateEmbed::default()
            .title("Bot Commands")
            .description("Here are the available commands:")
            .color(colors::MUSIC_PURPLE)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
        |embed, help| {
            embed.field(
                format!("{}{}", prefix, help.usage),
                help.description,
                !help.takes_argument,
            )
        },
    )
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
