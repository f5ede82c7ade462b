use thiserror::Error;

use crate::audio::queue::PlayerStatus;

/// Failures surfaced by the playback pipeline.
///
/// None of these are fatal: command handlers report them back to the channel and
/// the guild player keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("could not find anything playable for `{query}`: {reason}")]
    Resolution { query: String, reason: String },

    #[error("I am not connected to a voice channel")]
    NotInVoice,

    #[error("cannot {action} while {status}")]
    InvalidTransition {
        action: &'static str,
        status: PlayerStatus,
    },

    #[error("voice output failed: {0}")]
    Sink(String),

    #[error("the queue is full (max {0} tracks)")]
    QueueFull(usize),

    #[error("the player for this server stopped responding")]
    PlayerGone,
}

impl PlaybackError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    /// Short reply for the chat channel.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidTransition { action: "resume", .. } => {
                "Nothing is paused right now.".to_string()
            }
            Self::InvalidTransition { .. } => "Nothing is playing right now.".to_string(),
            Self::NotInVoice => "I am not in a voice channel.".to_string(),
            other => format!("An error occurred: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transitions_read_like_chat_replies() {
        let err = PlaybackError::InvalidTransition {
            action: "pause",
            status: PlayerStatus::Idle,
        };
        assert_eq!(err.to_string(), "cannot pause while idle");
        assert_eq!(err.user_message(), "Nothing is playing right now.");

        let err = PlaybackError::InvalidTransition {
            action: "resume",
            status: PlayerStatus::Playing,
        };
        assert_eq!(err.user_message(), "Nothing is paused right now.");
    }

    #[test]
    fn resolution_errors_carry_the_query() {
        let err = PlaybackError::resolution("never gonna", "no results");
        assert_eq!(
            err.user_message(),
            "An error occurred: could not find anything playable for `never gonna`: no results"
        );
    }
}
