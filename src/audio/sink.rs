use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{ControlError, PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::{player::PlayerCommand, queue::PlayToken};
use crate::{error::PlaybackError, sources::Track};

/// Reports the end of one `play` call back to the guild player.
///
/// Consumed when fired, so a play call can complete at most once.
#[derive(Debug)]
pub struct Completion {
    token: PlayToken,
    events: mpsc::UnboundedSender<PlayerCommand>,
}

impl Completion {
    pub(crate) fn new(token: PlayToken, events: mpsc::UnboundedSender<PlayerCommand>) -> Self {
        Self { token, events }
    }

    pub fn token(&self) -> PlayToken {
        self.token
    }

    pub fn finish(self, error: Option<String>) {
        if self
            .events
            .send(PlayerCommand::TrackEnded {
                token: self.token,
                error,
            })
            .is_err()
        {
            debug!("Guild player gone, dropping completion for {:?}", self.token);
        }
    }
}

/// Voice output for one guild: plays a single stream at a time.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Starts `track`, replacing anything still playing. `done` fires when the
    /// stream ends for any reason.
    async fn play(&self, track: &Track, done: Completion) -> Result<(), PlaybackError>;

    async fn pause(&self) -> Result<(), PlaybackError>;

    async fn resume(&self) -> Result<(), PlaybackError>;

    async fn stop(&self) -> Result<(), PlaybackError>;
}

/// Songbird-backed sink for a joined voice channel.
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>, http: reqwest::Client, volume: f32) -> Self {
        Self {
            call,
            http,
            volume,
            current: SyncMutex::new(None),
        }
    }

    fn with_current<F>(&self, action: &str, f: F) -> Result<(), PlaybackError>
    where
        F: FnOnce(&TrackHandle) -> Result<(), ControlError>,
    {
        let current = self.current.lock();
        let handle = current
            .as_ref()
            .ok_or_else(|| PlaybackError::Sink(format!("nothing to {action}")))?;
        f(handle).map_err(|e| PlaybackError::Sink(format!("{action} failed: {e}")))
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn play(&self, track: &Track, done: Completion) -> Result<(), PlaybackError> {
        let input: Input = HttpRequest::new(self.http.clone(), track.stream_url().to_string()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        let notifier = TrackEndNotifier::new(done);
        let registered = handle
            .set_volume(self.volume)
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::End), notifier.clone()))
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), notifier));

        if let Err(e) = registered {
            error!("Could not set up track {}: {}", track.title(), e);
            let _ = handle.stop();
            return Err(PlaybackError::Sink(e.to_string()));
        }

        info!("🎵 Streaming: {}", track.title());
        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.with_current("pause", |h| h.pause())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.with_current("resume", |h| h.play())
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        let handle = self.current.lock().take();
        match handle {
            Some(handle) => handle
                .stop()
                .map_err(|e| PlaybackError::Sink(format!("stop failed: {e}"))),
            None => Ok(()),
        }
    }
}

/// Fires the completion on the first End or Error event for a track.
#[derive(Clone)]
struct TrackEndNotifier {
    completion: Arc<SyncMutex<Option<Completion>>>,
}

impl TrackEndNotifier {
    fn new(completion: Completion) -> Self {
        Self {
            completion: Arc::new(SyncMutex::new(Some(completion))),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        };

        if let Some(completion) = self.completion.lock().take() {
            if let Some(e) = &error {
                warn!("❌ Track {:?} errored: {}", completion.token(), e);
            }
            completion.finish(error);
        }

        // Remove this handler from the track.
        Some(Event::Cancel)
    }
}
