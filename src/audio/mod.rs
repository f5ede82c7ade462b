//! # Audio Module
//!
//! Per-guild playback for Violet Music.
//!
//! ## Architecture
//!
//! ### [`queue`] - Playback state machine
//! Pure, synchronous state for one guild: the current track, the pending FIFO,
//! the loop flag and the play tokens that make late completions harmless.
//!
//! ### [`player`] - Guild players
//! Each guild gets its own task owning a [`queue::GuildPlaybackState`]. Commands
//! and track completions arrive on one channel and are applied in order, so
//! playback transitions for a guild never interleave.
//!
//! ### [`sink`] - Voice output
//! The [`sink::VoiceSink`] seam and its songbird implementation. A sink plays
//! one stream at a time and reports its end through a [`sink::Completion`].
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let players = PlayerRegistry::new(100, None);
//! let player = players.get(guild_id);
//!
//! player.attach(sink, Some(announcer)).await?;
//! match player.enqueue(track).await? {
//!     Enqueued::Started => {}
//!     Enqueued::Queued(position) => println!("queued at #{position}"),
//! }
//! player.skip().await?;
//! ```

pub mod player;
pub mod queue;
pub mod sink;
