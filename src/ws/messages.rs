//! Wire envelopes for the room protocol and their typed counterparts.

use serde::{Deserialize, Serialize};

use crate::board::{BoardError, BoardState, Square};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Raw frame shape: `{"type": ..., "data": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminator from the closed message catalog.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Payload; its shape depends on `kind`.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Present only on failure notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    fn with_data(kind: &str, data: impl Into<String>) -> Self {
        Envelope {
            kind: Some(kind.to_string()),
            data: serde_json::Value::String(data.into()),
            error: None,
        }
    }
}

/// Errors raised while decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no type")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("bad {kind} payload: {reason}")]
    Payload { kind: String, reason: String },

    #[error("bad board in payload: {0}")]
    Board(#[from] BoardError),
}

impl ProtocolError {
    fn payload(kind: &str, reason: impl Into<String>) -> Self {
        ProtocolError::Payload {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server commands
// ---------------------------------------------------------------------------

/// Commands sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RegisterUsername(String),
    CreateRoom,
    JoinRoom(String),
    RequestLegalMoves(Square),
    MovePiece { from: Square, to: Square },
    Ping,
}

impl Command {
    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::RegisterUsername(_) => "registerUsername",
            Command::CreateRoom => "createRoom",
            Command::JoinRoom(_) => "joinRoom",
            Command::RequestLegalMoves(_) => "requestLegalMoves",
            Command::MovePiece { .. } => "movePiece",
            Command::Ping => "ping",
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            Command::RegisterUsername(name) => name.clone(),
            Command::JoinRoom(code) => code.clone(),
            Command::RequestLegalMoves(sq) => sq.to_algebraic(),
            Command::MovePiece { from, to } => format!("{from},{to}"),
            Command::CreateRoom | Command::Ping => String::new(),
        };
        Envelope::with_data(self.kind(), data)
    }

    /// Serialize to JSON text for sending over WebSocket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_envelope()).unwrap_or_else(|_| {
            // Envelope holds only strings.
            format!(r#"{{"type":"{}","data":""}}"#, self.kind())
        })
    }
}

// ---------------------------------------------------------------------------
// Server → Client notifications
// ---------------------------------------------------------------------------

/// Membership status of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
}

impl RoomStatus {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(RoomStatus::Waiting),
            2 => Some(RoomStatus::Active),
            3 => Some(RoomStatus::Finished),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            RoomStatus::Waiting => 1,
            RoomStatus::Active => 2,
            RoomStatus::Finished => 3,
        }
    }
}

/// `roomStatus` payload. An empty `name` signals teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub name: String,
    pub white: String,
    pub black: String,
    /// `None` only on teardown snapshots.
    pub status: Option<RoomStatus>,
}

impl RoomSnapshot {
    pub fn is_teardown(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawRoomStatus {
    #[serde(default)]
    name: String,
    #[serde(default)]
    white: String,
    #[serde(default)]
    black: String,
    #[serde(default)]
    status: u64,
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RoomCreated(String),
    RoomJoined(String),
    RoomStatus(RoomSnapshot),
    LegalMoves(Vec<Square>),
    GameState(BoardState),
    GameResult(BoardState),
    /// Any envelope that carries an `error` field.
    Error { kind: String, message: String },
}

impl Notification {
    /// Decode one text frame.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Notification::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        if let Some(message) = envelope.error {
            let kind = envelope
                .kind
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(Notification::Error { kind, message });
        }

        let kind = match envelope.kind {
            Some(kind) if !kind.is_empty() => kind,
            _ => return Err(ProtocolError::MissingType),
        };

        match kind.as_str() {
            "roomCreated" => Ok(Notification::RoomCreated(room_code(&kind, &envelope.data)?)),
            "roomJoined" => Ok(Notification::RoomJoined(room_code(&kind, &envelope.data)?)),
            "roomStatus" => Ok(Notification::RoomStatus(room_snapshot(&kind, envelope.data)?)),
            "legalMoves" => Ok(Notification::LegalMoves(square_list(
                string_data(&kind, &envelope.data)?,
            )?)),
            "gameState" => Ok(Notification::GameState(BoardState::from_snapshot(
                string_data(&kind, &envelope.data)?,
            )?)),
            "gameResult" => {
                let board = BoardState::from_snapshot(string_data(&kind, &envelope.data)?)?;
                if !board.phase().is_terminal() {
                    return Err(ProtocolError::payload(
                        &kind,
                        format!("phase {} is not terminal", board.phase()),
                    ));
                }
                Ok(Notification::GameResult(board))
            }
            _ => Err(ProtocolError::UnknownType(kind.clone())),
        }
    }

    /// Wire `type` tag this notification was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            Notification::RoomCreated(_) => "roomCreated",
            Notification::RoomJoined(_) => "roomJoined",
            Notification::RoomStatus(_) => "roomStatus",
            Notification::LegalMoves(_) => "legalMoves",
            Notification::GameState(_) => "gameState",
            Notification::GameResult(_) => "gameResult",
            Notification::Error { kind, .. } => kind,
        }
    }
}

fn string_data<'a>(kind: &str, data: &'a serde_json::Value) -> Result<&'a str, ProtocolError> {
    match data {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(""),
        other => Err(ProtocolError::payload(
            kind,
            format!("expected a string, got {other}"),
        )),
    }
}

fn room_code(kind: &str, data: &serde_json::Value) -> Result<String, ProtocolError> {
    let code = string_data(kind, data)?.trim();
    if code.is_empty() {
        return Err(ProtocolError::payload(kind, "empty room code"));
    }
    Ok(code.to_string())
}

/// Accepts the object directly or a string holding the object.
fn room_snapshot(kind: &str, data: serde_json::Value) -> Result<RoomSnapshot, ProtocolError> {
    let raw: RawRoomStatus = match data {
        serde_json::Value::String(s) => serde_json::from_str(&s),
        other => serde_json::from_value(other),
    }
    .map_err(|e| ProtocolError::payload(kind, e.to_string()))?;

    if raw.name.is_empty() {
        return Ok(RoomSnapshot {
            name: String::new(),
            white: String::new(),
            black: String::new(),
            status: None,
        });
    }

    let status = RoomStatus::from_code(raw.status)
        .ok_or_else(|| ProtocolError::payload(kind, format!("unknown status {}", raw.status)))?;
    Ok(RoomSnapshot {
        name: raw.name,
        white: raw.white,
        black: raw.black,
        status: Some(status),
    })
}

/// Comma-separated algebraic squares; empty string means no moves.
fn square_list(data: &str) -> Result<Vec<Square>, ProtocolError> {
    data.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Square>().map_err(ProtocolError::from))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
