use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    queue::{Advance, EndReason, GuildPlaybackState, PlayRequest, PlayToken, PlaybackSnapshot},
    sink::{Completion, VoiceSink},
};
use crate::{
    error::PlaybackError,
    sources::Track,
    storage::{HistoryEntry, HistorySink},
};

/// Posts "now playing" notices for a guild.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, track: &Track, loop_enabled: bool);
}

/// Outcome of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The guild was idle and the track started right away.
    Started,
    /// Waiting at this 1-based position.
    Queued(usize),
}

type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

/// Messages processed by a guild player, in arrival order.
pub enum PlayerCommand {
    Attach {
        sink: Arc<dyn VoiceSink>,
        announcer: Option<Arc<dyn Announcer>>,
        reply: Reply<()>,
    },
    Detach {
        reply: Reply<()>,
    },
    Enqueue {
        track: Track,
        reply: Reply<Enqueued>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Skip {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    ToggleLoop {
        reply: Reply<bool>,
    },
    Snapshot {
        reply: Reply<PlaybackSnapshot>,
    },
    TrackEnded {
        token: PlayToken,
        error: Option<String>,
    },
}

impl std::fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlayerCommand::Attach { .. } => "Attach",
            PlayerCommand::Detach { .. } => "Detach",
            PlayerCommand::Enqueue { .. } => "Enqueue",
            PlayerCommand::Pause { .. } => "Pause",
            PlayerCommand::Resume { .. } => "Resume",
            PlayerCommand::Skip { .. } => "Skip",
            PlayerCommand::Stop { .. } => "Stop",
            PlayerCommand::ToggleLoop { .. } => "ToggleLoop",
            PlayerCommand::Snapshot { .. } => "Snapshot",
            PlayerCommand::TrackEnded { .. } => "TrackEnded",
        };
        f.write_str(name)
    }
}

/// Cheap, cloneable handle to a guild player task.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> PlayerCommand,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| PlaybackError::PlayerGone)?;
        rx.await.map_err(|_| PlaybackError::PlayerGone)?
    }

    /// Connects a voice sink. An already attached sink is kept; the announcer is
    /// always replaced so notices follow the latest command channel.
    pub async fn attach(
        &self,
        sink: Arc<dyn VoiceSink>,
        announcer: Option<Arc<dyn Announcer>>,
    ) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Attach {
            sink,
            announcer,
            reply,
        })
        .await
    }

    /// Stops playback, clears the queue and forgets the sink.
    pub async fn detach(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Detach { reply }).await
    }

    pub async fn enqueue(&self, track: Track) -> Result<Enqueued, PlaybackError> {
        self.request(|reply| PlayerCommand::Enqueue { track, reply })
            .await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Resume { reply }).await
    }

    pub async fn skip(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Skip { reply }).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerCommand::Stop { reply }).await
    }

    pub async fn toggle_loop(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlayerCommand::ToggleLoop { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot, PlaybackError> {
        self.request(|reply| PlayerCommand::Snapshot { reply })
            .await
    }
}

/// Owns one guild's playback state. Runs as its own task; nothing else touches
/// the state, so transitions for a guild never overlap.
struct GuildPlayer {
    guild_id: GuildId,
    state: GuildPlaybackState,
    sink: Option<Arc<dyn VoiceSink>>,
    announcer: Option<Arc<dyn Announcer>>,
    history: Option<Arc<dyn HistorySink>>,
    events: mpsc::UnboundedSender<PlayerCommand>,
}

impl GuildPlayer {
    fn spawn(
        guild_id: GuildId,
        max_queue_size: usize,
        history: Option<Arc<dyn HistorySink>>,
    ) -> PlayerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = GuildPlayer {
            guild_id,
            state: GuildPlaybackState::new(max_queue_size),
            sink: None,
            announcer: None,
            history,
            events: tx.clone(),
        };
        tokio::spawn(player.run(rx));
        debug!("Spawned player for guild {}", guild_id);

        PlayerHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PlayerCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
    }

    async fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Attach {
                sink,
                announcer,
                reply,
            } => {
                if self.sink.is_none() {
                    info!("🔊 Voice sink attached in guild {}", self.guild_id);
                    self.sink = Some(sink);
                }
                self.announcer = announcer;
                let _ = reply.send(Ok(()));
            }
            PlayerCommand::Detach { reply } => {
                self.detach().await;
                let _ = reply.send(Ok(()));
            }
            PlayerCommand::Enqueue { track, reply } => {
                let result = self.enqueue(track).await;
                let _ = reply.send(result);
            }
            PlayerCommand::Pause { reply } => {
                let result = self.pause().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Resume { reply } => {
                let result = self.resume().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Skip { reply } => {
                let result = self.skip(false).await;
                let _ = reply.send(result);
            }
            PlayerCommand::Stop { reply } => {
                let result = self.skip(true).await;
                let _ = reply.send(result);
            }
            PlayerCommand::ToggleLoop { reply } => {
                let _ = reply.send(Ok(self.state.toggle_loop()));
            }
            PlayerCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.state.snapshot(self.sink.is_some())));
            }
            PlayerCommand::TrackEnded { token, error } => {
                let reason = match error {
                    Some(e) => {
                        warn!("⚠️ Playback error in guild {}: {}", self.guild_id, e);
                        EndReason::Failed(e)
                    }
                    None => EndReason::Finished,
                };
                match self.state.finish(token, reason) {
                    Advance::Stale => debug!("Stale completion {:?} ignored", token),
                    Advance::Next(request) => {
                        if let Err(e) = self.start(request).await {
                            warn!("Queue in guild {} ended without playback: {}", self.guild_id, e);
                        }
                    }
                    Advance::Idle => info!("⏹️ Guild {} is idle", self.guild_id),
                }
            }
        }
    }

    fn sink(&self) -> Result<Arc<dyn VoiceSink>, PlaybackError> {
        self.sink.clone().ok_or(PlaybackError::NotInVoice)
    }

    async fn enqueue(&mut self, track: Track) -> Result<Enqueued, PlaybackError> {
        self.sink()?;
        match self.state.enqueue(track)? {
            Some(request) => {
                self.start(request).await?;
                Ok(Enqueued::Started)
            }
            None => Ok(Enqueued::Queued(self.state.pending_len())),
        }
    }

    async fn pause(&mut self) -> Result<(), PlaybackError> {
        let sink = self.sink()?;
        self.state.can_pause()?;
        sink.pause().await?;
        self.state.pause()?;
        info!("⏸️ Paused in guild {}", self.guild_id);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        let sink = self.sink()?;
        self.state.can_resume()?;
        sink.resume().await?;
        self.state.resume()?;
        info!("▶️ Resumed in guild {}", self.guild_id);
        Ok(())
    }

    /// Skip and stop both end the current stream; the sink's completion advances
    /// the queue.
    async fn skip(&mut self, clear: bool) -> Result<(), PlaybackError> {
        let sink = self.sink()?;
        let token = if clear {
            self.state.stop()?
        } else {
            self.state.skip()?
        };
        debug!("Ending {:?} in guild {}", token, self.guild_id);

        if let Err(e) = sink.stop().await {
            // Without a stop there is no completion either; advance ourselves.
            warn!("Sink failed to stop in guild {}: {}", self.guild_id, e);
            if let Advance::Next(request) = self.state.finish(token, EndReason::Finished) {
                if let Err(e) = self.start(request).await {
                    warn!("Queue in guild {} ended without playback: {}", self.guild_id, e);
                }
            }
        }
        Ok(())
    }

    async fn detach(&mut self) {
        let playing = self.state.reset();
        if let Some(sink) = self.sink.take() {
            if playing.is_some() {
                if let Err(e) = sink.stop().await {
                    warn!("Sink failed to stop on detach: {}", e);
                }
            }
        }
        self.announcer = None;
        info!("👋 Player detached in guild {}", self.guild_id);
    }

    /// Hands tracks to the sink until one is accepted or the queue runs dry. When
    /// nothing could be started, returns the last refusal.
    async fn start(&mut self, mut request: PlayRequest) -> Result<(), PlaybackError> {
        loop {
            let Some(sink) = self.sink.clone() else {
                warn!("No sink in guild {}, dropping playback", self.guild_id);
                self.state.reset();
                return Err(PlaybackError::NotInVoice);
            };

            let done = Completion::new(request.token, self.events.clone());
            match sink.play(&request.track, done).await {
                Ok(()) => {
                    self.on_started(&request).await;
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "❌ Could not play {} in guild {}: {}",
                        request.track.title(),
                        self.guild_id,
                        e
                    );
                    match self
                        .state
                        .finish(request.token, EndReason::Rejected(e.to_string()))
                    {
                        Advance::Next(next) => request = next,
                        _ => return Err(e),
                    }
                }
            }
        }
    }

    /// Announces every start; loop replays are not recorded again.
    async fn on_started(&self, request: &PlayRequest) {
        let track = &request.track;
        info!("🎶 Now playing in guild {}: {}", self.guild_id, track.title());

        if let Some(announcer) = self.announcer.clone() {
            let track = track.clone();
            let loop_enabled = self.state.loop_enabled();
            tokio::spawn(async move {
                announcer.now_playing(&track, loop_enabled).await;
            });
        }

        if request.looped {
            return;
        }
        if let Some(history) = &self.history {
            let entry = HistoryEntry {
                user_id: track.requester().id.get(),
                title: track.title().to_string(),
                url: track.page_url().to_string(),
                platform: track.platform(),
                played_at: Utc::now(),
            };
            if let Err(e) = history.record(entry).await {
                warn!("Could not record history: {:?}", e);
            }
        }
    }
}

/// Process-wide map of guild players, created on first use and kept for the
/// lifetime of the process.
pub struct PlayerRegistry {
    players: DashMap<GuildId, PlayerHandle>,
    max_queue_size: usize,
    history: Option<Arc<dyn HistorySink>>,
}

impl PlayerRegistry {
    pub fn new(max_queue_size: usize, history: Option<Arc<dyn HistorySink>>) -> Self {
        Self {
            players: DashMap::new(),
            max_queue_size,
            history,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> PlayerHandle {
        self.players
            .entry(guild_id)
            .or_insert_with(|| GuildPlayer::spawn(guild_id, self.max_queue_size, self.history.clone()))
            .clone()
    }

    /// The player for a guild, if one was ever created.
    pub fn existing(&self, guild_id: GuildId) -> Option<PlayerHandle> {
        self.players.get(&guild_id).map(|p| p.clone())
    }
}
