use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info};

use crate::{error::PlaybackError, sources::Track};

/// What the voice sink is doing for a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
        })
    }
}

/// Tags one `play` call on the sink. Completions carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayToken(u64);

/// A track the sink should start now.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub token: PlayToken,
    pub track: Track,
    /// Set when the loop flag put the previous track back in front.
    pub looped: bool,
}

/// Why the sink reported a track as finished.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    /// Natural end, or stopped by a skip/stop.
    Finished,
    /// The stream broke while playing.
    Failed(String),
    /// The sink refused to start the track at all.
    Rejected(String),
}

/// Result of feeding a completion into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The completion belongs to a play call that is no longer current.
    Stale,
    Next(PlayRequest),
    Idle,
}

#[derive(Debug, Clone)]
struct NowPlaying {
    token: PlayToken,
    track: Track,
}

/// Read-only view for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub status: PlayerStatus,
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub loop_enabled: bool,
    pub attached: bool,
}

impl PlaybackSnapshot {
    pub fn pending_duration(&self) -> Duration {
        self.pending.iter().filter_map(Track::duration).sum()
    }
}

/// Per-guild queue and playback state machine.
///
/// The state itself never talks to the sink; every transition returns what the
/// caller has to do next. `Idle` always means there is no current track.
#[derive(Debug)]
pub struct GuildPlaybackState {
    pending: VecDeque<Track>,
    current: Option<NowPlaying>,
    status: PlayerStatus,
    loop_enabled: bool,
    halt_requested: bool,
    next_token: u64,
    max_pending: usize,
}

impl GuildPlaybackState {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            status: PlayerStatus::Idle,
            loop_enabled: false,
            halt_requested: false,
            next_token: 0,
            max_pending,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref().map(|np| &np.track)
    }

    pub fn current_token(&self) -> Option<PlayToken> {
        self.current.as_ref().map(|np| np.token)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Track> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Appends a track. Returns the track to start when the guild was idle.
    pub fn enqueue(&mut self, track: Track) -> Result<Option<PlayRequest>, PlaybackError> {
        if self.pending.len() >= self.max_pending {
            return Err(PlaybackError::QueueFull(self.max_pending));
        }

        info!("➕ Queued: {}", track.title());
        self.pending.push_back(track);

        if self.status == PlayerStatus::Idle {
            Ok(self.pop_next())
        } else {
            Ok(None)
        }
    }

    /// Checks a pause without applying it, so the sink can be asked first.
    pub fn can_pause(&self) -> Result<PlayToken, PlaybackError> {
        self.require("pause", &[PlayerStatus::Playing])
    }

    pub fn can_resume(&self) -> Result<PlayToken, PlaybackError> {
        self.require("resume", &[PlayerStatus::Paused])
    }

    pub fn pause(&mut self) -> Result<PlayToken, PlaybackError> {
        let token = self.can_pause()?;
        self.status = PlayerStatus::Paused;
        Ok(token)
    }

    pub fn resume(&mut self) -> Result<PlayToken, PlaybackError> {
        let token = self.can_resume()?;
        self.status = PlayerStatus::Playing;
        Ok(token)
    }

    /// Validates a skip. The state advances when the sink's completion arrives.
    pub fn skip(&mut self) -> Result<PlayToken, PlaybackError> {
        self.require("skip", &[PlayerStatus::Playing, PlayerStatus::Paused])
    }

    /// Clears the pending queue. The completion that follows will not loop.
    pub fn stop(&mut self) -> Result<PlayToken, PlaybackError> {
        let token = self.require("stop", &[PlayerStatus::Playing, PlayerStatus::Paused])?;
        let cleared = self.pending.len();
        self.pending.clear();
        self.halt_requested = true;
        info!("⏹️ Stop requested, {} pending tracks cleared", cleared);
        Ok(token)
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        if self.loop_enabled {
            info!("🔂 Loop enabled");
        } else {
            info!("➡️ Loop disabled");
        }
        self.loop_enabled
    }

    /// Feeds a sink completion into the state machine.
    pub fn finish(&mut self, token: PlayToken, reason: EndReason) -> Advance {
        if self.current_token() != Some(token) {
            debug!("Ignoring stale completion for {:?}", token);
            return Advance::Stale;
        }
        let Some(finished) = self.current.take() else {
            return Advance::Stale;
        };

        let halted = std::mem::take(&mut self.halt_requested);
        let replay = self.loop_enabled && !halted && !matches!(reason, EndReason::Rejected(_));
        if replay {
            info!("🔂 Looping: {}", finished.track.title());
            self.pending.push_front(finished.track);
        }

        match self.pop_next() {
            Some(request) => Advance::Next(PlayRequest {
                looped: replay,
                ..request
            }),
            None => Advance::Idle,
        }
    }

    /// Drops everything, e.g. when the bot leaves the channel. Returns the token of
    /// the track that was playing so the caller can stop it.
    pub fn reset(&mut self) -> Option<PlayToken> {
        let token = self.current_token();
        self.pending.clear();
        self.current = None;
        self.status = PlayerStatus::Idle;
        self.halt_requested = false;
        token
    }

    pub fn snapshot(&self, attached: bool) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status(),
            current: self.current().cloned(),
            pending: self.pending().cloned().collect(),
            loop_enabled: self.loop_enabled,
            attached,
        }
    }

    fn require(
        &self,
        action: &'static str,
        allowed: &[PlayerStatus],
    ) -> Result<PlayToken, PlaybackError> {
        match self.current_token() {
            Some(token) if allowed.contains(&self.status) => Ok(token),
            _ => Err(PlaybackError::InvalidTransition {
                action,
                status: self.status,
            }),
        }
    }

    fn pop_next(&mut self) -> Option<PlayRequest> {
        let Some(track) = self.pending.pop_front() else {
            self.status = PlayerStatus::Idle;
            info!("📭 Queue finished");
            return None;
        };

        self.next_token += 1;
        let token = PlayToken(self.next_token);
        self.current = Some(NowPlaying {
            token,
            track: track.clone(),
        });
        self.status = PlayerStatus::Playing;
        debug!("➡️ Next (FIFO): {} as {:?}", track.title(), token);

        Some(PlayRequest {
            token,
            track,
            looped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::track;
    use pretty_assertions::assert_eq;

    fn titles(state: &GuildPlaybackState) -> Vec<String> {
        state.pending().map(|t| t.title().to_string()).collect()
    }

    fn started(advance: Option<PlayRequest>) -> PlayRequest {
        advance.expect("expected playback to start")
    }

    #[test]
    fn first_enqueue_starts_and_rest_stay_in_order() {
        let mut state = GuildPlaybackState::new(10);

        let first = started(state.enqueue(track("a")).unwrap());
        assert_eq!(first.track.title(), "a");
        assert_eq!(state.status(), PlayerStatus::Playing);

        for name in ["b", "c", "d"] {
            assert_eq!(state.enqueue(track(name)).unwrap(), None);
        }
        assert_eq!(titles(&state), vec!["b", "c", "d"]);
        assert_eq!(state.current().map(Track::title), Some("a"));
    }

    #[test]
    fn pause_then_resume_keeps_queue_and_current() {
        let mut state = GuildPlaybackState::new(10);
        state.enqueue(track("a")).unwrap();
        state.enqueue(track("b")).unwrap();

        state.pause().unwrap();
        assert_eq!(state.status(), PlayerStatus::Paused);
        state.resume().unwrap();

        assert_eq!(state.status(), PlayerStatus::Playing);
        assert_eq!(state.current().map(Track::title), Some("a"));
        assert_eq!(titles(&state), vec!["b"]);
    }

    #[test]
    fn invalid_transitions_are_rejected_without_changes() {
        let mut state = GuildPlaybackState::new(10);
        assert_eq!(
            state.pause(),
            Err(PlaybackError::InvalidTransition {
                action: "pause",
                status: PlayerStatus::Idle
            })
        );
        assert!(state.skip().is_err());
        assert!(state.stop().is_err());

        state.enqueue(track("a")).unwrap();
        assert!(state.resume().is_err());
        state.pause().unwrap();
        assert_eq!(
            state.pause(),
            Err(PlaybackError::InvalidTransition {
                action: "pause",
                status: PlayerStatus::Paused
            })
        );
        assert_eq!(state.status(), PlayerStatus::Paused);
    }

    #[test]
    fn skip_scenario_walks_through_the_queue() {
        let mut state = GuildPlaybackState::new(10);
        let a = started(state.enqueue(track("a")).unwrap());
        state.enqueue(track("b")).unwrap();
        assert_eq!(titles(&state), vec!["b"]);

        assert_eq!(state.skip().unwrap(), a.token);
        let Advance::Next(b) = state.finish(a.token, EndReason::Finished) else {
            panic!("expected b to start");
        };
        assert_eq!(b.track.title(), "b");
        assert_eq!(state.status(), PlayerStatus::Playing);
        assert!(titles(&state).is_empty());

        state.skip().unwrap();
        assert_eq!(state.finish(b.token, EndReason::Finished), Advance::Idle);
        assert_eq!(state.status(), PlayerStatus::Idle);
        assert_eq!(state.current(), None);
    }

    #[test]
    fn loop_replays_before_newer_tracks() {
        let mut state = GuildPlaybackState::new(10);
        let a = started(state.enqueue(track("a")).unwrap());
        state.enqueue(track("b")).unwrap();
        assert!(state.toggle_loop());

        let Advance::Next(again) = state.finish(a.token, EndReason::Finished) else {
            panic!("expected a replay");
        };
        assert_eq!(again.track.title(), "a");
        assert_ne!(again.token, a.token);
        assert!(!a.looped);
        assert!(again.looped);
        assert_eq!(titles(&state), vec!["b"]);

        state.toggle_loop();
        let Advance::Next(b) = state.finish(again.token, EndReason::Finished) else {
            panic!("expected b");
        };
        assert_eq!(b.track.title(), "b");
        assert!(!b.looped);
    }

    #[test]
    fn pause_check_leaves_state_untouched() {
        let mut state = GuildPlaybackState::new(10);
        assert!(state.can_pause().is_err());

        let a = started(state.enqueue(track("a")).unwrap());
        assert_eq!(state.can_pause(), Ok(a.token));
        assert_eq!(state.status(), PlayerStatus::Playing);
        assert_eq!(
            state.can_resume(),
            Err(PlaybackError::InvalidTransition {
                action: "resume",
                status: PlayerStatus::Playing
            })
        );

        state.pause().unwrap();
        assert_eq!(state.can_resume(), Ok(a.token));
        assert_eq!(state.status(), PlayerStatus::Paused);
    }

    #[test]
    fn loop_applies_to_broken_streams_but_not_rejected_starts() {
        let mut state = GuildPlaybackState::new(10);
        state.toggle_loop();
        let a = started(state.enqueue(track("a")).unwrap());

        let Advance::Next(again) = state.finish(a.token, EndReason::Failed("eof".into())) else {
            panic!("expected a replay");
        };
        assert_eq!(again.track.title(), "a");

        assert_eq!(
            state.finish(again.token, EndReason::Rejected("bad input".into())),
            Advance::Idle
        );
    }

    #[test]
    fn stop_clears_queue_and_ends_idle_even_with_loop() {
        let mut state = GuildPlaybackState::new(10);
        let a = started(state.enqueue(track("a")).unwrap());
        state.enqueue(track("b")).unwrap();
        state.enqueue(track("c")).unwrap();
        state.toggle_loop();

        state.stop().unwrap();
        assert!(titles(&state).is_empty());
        // Still playing until the sink confirms.
        assert_eq!(state.status(), PlayerStatus::Playing);

        assert_eq!(state.finish(a.token, EndReason::Finished), Advance::Idle);
        assert_eq!(state.status(), PlayerStatus::Idle);
    }

    #[test]
    fn stale_completion_does_not_touch_state() {
        let mut state = GuildPlaybackState::new(10);
        let a = started(state.enqueue(track("a")).unwrap());
        state.enqueue(track("b")).unwrap();
        let Advance::Next(b) = state.finish(a.token, EndReason::Finished) else {
            panic!("expected b");
        };
        state.enqueue(track("c")).unwrap();

        assert_eq!(state.finish(a.token, EndReason::Finished), Advance::Stale);
        assert_eq!(state.current_token(), Some(b.token));
        assert_eq!(state.status(), PlayerStatus::Playing);
        assert_eq!(titles(&state), vec!["c"]);
    }

    #[test]
    fn queue_limit_is_enforced() {
        let mut state = GuildPlaybackState::new(1);
        state.enqueue(track("a")).unwrap();
        state.enqueue(track("b")).unwrap();
        assert_eq!(
            state.enqueue(track("c")),
            Err(PlaybackError::QueueFull(1))
        );
        assert_eq!(titles(&state), vec!["b"]);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut state = GuildPlaybackState::new(10);
        let a = started(state.enqueue(track("a")).unwrap());
        state.enqueue(track("b")).unwrap();

        assert_eq!(state.reset(), Some(a.token));
        assert_eq!(state.status(), PlayerStatus::Idle);
        assert_eq!(state.finish(a.token, EndReason::Finished), Advance::Stale);

        let snapshot = state.snapshot(false);
        assert_eq!(snapshot.current, None);
        assert!(snapshot.pending.is_empty());
    }

    #[test]
    fn snapshot_sums_pending_durations() {
        let mut state = GuildPlaybackState::new(10);
        state.enqueue(track("a")).unwrap();
        state
            .enqueue(track("b").with_duration(Duration::from_secs(90)))
            .unwrap();
        state.enqueue(track("c")).unwrap();

        let snapshot = state.snapshot(true);
        assert_eq!(snapshot.pending_duration(), Duration::from_secs(90));
        assert!(snapshot.attached);
    }
}
