use chrono::{DateTime, Duration, Utc};

use crate::board::Square;
use crate::ws::messages::ProtocolError;

/// Why a local click was ignored. Never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotInGame,
    EmptySquare,
    NotYourPiece,
    NotYourTurn,
    NoColorAssigned,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::NotInGame => "not_in_game",
            Rejection::EmptySquare => "empty_square",
            Rejection::NotYourPiece => "not_your_piece",
            Rejection::NotYourTurn => "not_your_turn",
            Rejection::NoColorAssigned => "no_color_assigned",
        }
    }
}

/// Everything that can go wrong in a session. None of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("dropped frame: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server rejected {kind}: {message}")]
    Application { kind: String, message: String },

    #[error("connection lost: {0}")]
    Connectivity(String),

    #[error("ignored input: {}", .0.as_str())]
    LocalValidation(Rejection),

    #[error("no legal moves received for {0}")]
    LegalMovesTimeout(Square),
}

/// A transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Banner {
    pub fn new(message: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Banner {
            message: message.into(),
            raised_at,
        }
    }

    pub fn from_error(err: &SessionError, raised_at: DateTime<Utc>) -> Self {
        Banner::new(err.to_string(), raised_at)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.raised_at >= ttl
    }
}
