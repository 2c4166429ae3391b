//! Session state machine: the single owner of session, room and board data.
//!
//! Every inbound frame, connection event, user command and timer tick is
//! applied here, one at a time, by the client loop. Handlers return the
//! commands to put on the wire; none of them perform I/O.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::board::{BoardState, Color, Square};
use crate::config::ClientConfig;
use crate::ws::messages::{Command, Notification, RoomSnapshot, RoomStatus};

use super::errors::{Banner, Rejection, SessionError};
use super::intent::{ClickOutcome, MoveIntentController};

// ---------------------------------------------------------------------------
// State & data
// ---------------------------------------------------------------------------

/// Position of the session in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Connecting,
    Authenticating,
    Lobby,
    WaitingForOpponent,
    InGame,
    GameOver,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Lobby => "lobby",
            SessionState::WaitingForOpponent => "waiting_for_opponent",
            SessionState::InGame => "in_game",
            SessionState::GameOver => "game_over",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connected,
}

/// A two-player room as last reported by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Room {
    pub code: String,
    pub white: String,
    pub black: String,
    pub status: RoomStatus,
}

impl Room {
    fn waiting(code: String) -> Self {
        Room {
            code,
            white: String::new(),
            black: String::new(),
            status: RoomStatus::Waiting,
        }
    }
}

/// Identity and membership of this client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub assigned_color: Option<Color>,
    pub room: Option<Room>,
    pub connectivity: Connectivity,
}

/// Commands issued by the UI layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserCommand {
    RegisterUsername(String),
    CreateRoom,
    JoinRoom(String),
    ClickSquare(Square),
    Reset,
}

/// Everything a renderer needs, cloned out of the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub state: SessionState,
    pub session: Session,
    pub board: BoardState,
    pub selected: Option<Square>,
    pub destinations: BTreeSet<Square>,
    pub banner: Option<Banner>,
}

// ---------------------------------------------------------------------------
// SessionStateMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    session: Session,
    board: BoardState,
    intent: MoveIntentController,
    banner: Option<Banner>,
    /// Username to register on the next open, before one is held.
    pending_username: Option<String>,
    /// Set while a `createRoom`/`joinRoom` sent from the lobby is unanswered.
    room_requested: bool,
    legal_moves_timeout: Duration,
    banner_ttl: Duration,
}

impl SessionStateMachine {
    pub fn new(config: &ClientConfig) -> Self {
        SessionStateMachine {
            state: SessionState::Connecting,
            session: Session::default(),
            board: BoardState::initial(),
            intent: MoveIntentController::new(),
            banner: None,
            pending_username: config.username.clone(),
            room_requested: false,
            legal_moves_timeout: to_chrono(config.legal_moves_timeout),
            banner_ttl: to_chrono(config.banner_ttl),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn intent(&self) -> &MoveIntentController {
        &self.intent
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            session: self.session.clone(),
            board: self.board.clone(),
            selected: self.intent.selected_square(),
            destinations: self.intent.destinations(),
            banner: self.banner.clone(),
        }
    }

    // -- connection events --

    pub fn on_connection_opened(&mut self) -> Vec<Command> {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "ignoring duplicate connection-opened");
            return Vec::new();
        }
        self.session.connectivity = Connectivity::Connected;
        self.transition(SessionState::Authenticating);

        let username = if self.session.username.is_empty() {
            self.pending_username.take()
        } else {
            Some(self.session.username.clone())
        };
        match username {
            Some(name) => self.register(name),
            None => Vec::new(),
        }
    }

    pub fn on_connection_closed(&mut self, reason: &str, now: DateTime<Utc>) {
        self.session.connectivity = Connectivity::Disconnected;
        self.intent.reset();
        self.room_requested = false;
        if self.state != SessionState::Connecting {
            self.raise(SessionError::Connectivity(reason.to_string()), now);
        }
        self.transition(SessionState::Connecting);
    }

    // -- inbound traffic --

    /// Decode and apply one text frame. Malformed frames are logged and dropped.
    pub fn on_frame(&mut self, text: &str, now: DateTime<Utc>) {
        match Notification::from_json(text) {
            Ok(notification) => self.on_notification(notification, now),
            Err(err) => self.raise(SessionError::Protocol(err), now),
        }
    }

    pub fn on_notification(&mut self, notification: Notification, now: DateTime<Utc>) {
        debug!(kind = notification.kind(), state = %self.state, "notification");
        match notification {
            Notification::Error { kind, message } => {
                if let Some(square) = self.intent.abandon_query() {
                    debug!(%square, "legal-moves query abandoned after server error");
                }
                if matches!(kind.as_str(), "createRoom" | "joinRoom") {
                    self.room_requested = false;
                }
                self.raise(SessionError::Application { kind, message }, now);
            }
            Notification::RoomCreated(code) | Notification::RoomJoined(code) => {
                self.on_room_assigned(code)
            }
            Notification::RoomStatus(snapshot) => self.on_room_status(snapshot),
            Notification::LegalMoves(squares) => {
                if self.state != SessionState::InGame || !self.intent.on_legal_moves(&squares) {
                    debug!(count = squares.len(), "dropping unsolicited legal moves");
                }
            }
            Notification::GameState(board) => match self.state {
                SessionState::InGame | SessionState::WaitingForOpponent => {
                    self.replace_board(board);
                }
                _ => debug!(state = %self.state, "dropping stale game state"),
            },
            Notification::GameResult(board) => match self.state {
                SessionState::InGame | SessionState::WaitingForOpponent | SessionState::GameOver => {
                    self.replace_board(board);
                    if let Some(room) = self.session.room.as_mut() {
                        room.status = RoomStatus::Finished;
                    }
                    self.transition(SessionState::GameOver);
                }
                _ => debug!(state = %self.state, "dropping stale game result"),
            },
        }
    }

    fn on_room_assigned(&mut self, code: String) {
        match self.state {
            SessionState::Lobby => {
                self.room_requested = false;
                self.session.room = Some(Room::waiting(code));
                self.session.assigned_color = None;
                self.transition(SessionState::WaitingForOpponent);
            }
            SessionState::WaitingForOpponent => {
                let same = self.session.room.as_ref().is_some_and(|r| r.code == code);
                if !same {
                    self.session.room = Some(Room::waiting(code));
                    self.session.assigned_color = None;
                }
            }
            _ => warn!(state = %self.state, code = %code, "room assignment outside lobby ignored"),
        }
    }

    fn on_room_status(&mut self, snapshot: RoomSnapshot) {
        if snapshot.is_teardown() {
            self.teardown_room();
            return;
        }

        match self.state {
            SessionState::Lobby
            | SessionState::WaitingForOpponent
            | SessionState::InGame
            | SessionState::GameOver => {}
            _ => {
                debug!(state = %self.state, room = %snapshot.name, "dropping stale room status");
                return;
            }
        }

        let Some(reported) = snapshot.status else {
            return;
        };
        if self.state == SessionState::Lobby {
            // Only adopt a room we asked for and are seated in; anything else
            // is a late frame for a room we already left.
            let seated = snapshot.white == self.session.username
                || snapshot.black == self.session.username;
            if !self.room_requested || !seated || reported == RoomStatus::Finished {
                debug!(room = %snapshot.name, "ignoring room status while in lobby");
                return;
            }
            self.room_requested = false;
        }
        // Same room: status never moves backwards.
        let status = match &self.session.room {
            Some(room) if room.code == snapshot.name => status_max(room.status, reported),
            _ => reported,
        };
        self.session.assigned_color = if snapshot.white == self.session.username {
            Some(Color::White)
        } else if snapshot.black == self.session.username {
            Some(Color::Black)
        } else {
            None
        };
        self.session.room = Some(Room {
            code: snapshot.name,
            white: snapshot.white,
            black: snapshot.black,
            status,
        });

        if self.state == SessionState::Lobby {
            self.transition(SessionState::WaitingForOpponent);
        }
        if self.state == SessionState::WaitingForOpponent && status == RoomStatus::Active {
            self.transition(SessionState::InGame);
        }
    }

    fn teardown_room(&mut self) {
        self.session.room = None;
        self.session.assigned_color = None;
        self.intent.reset();
        match self.state {
            // The final position stays on screen until the user resets.
            SessionState::GameOver => {}
            SessionState::WaitingForOpponent | SessionState::InGame => {
                self.board = BoardState::initial();
                self.transition(SessionState::Lobby);
            }
            _ => self.board = BoardState::initial(),
        }
    }

    fn replace_board(&mut self, board: BoardState) {
        self.board = board;
        self.intent.reset();
    }

    // -- user commands --

    pub fn on_user_command(&mut self, command: UserCommand, now: DateTime<Utc>) -> Vec<Command> {
        match command {
            UserCommand::RegisterUsername(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Vec::new();
                }
                match self.state {
                    SessionState::Authenticating => self.register(name),
                    SessionState::Connecting if self.session.username.is_empty() => {
                        debug!(name = %name, "username queued until connected");
                        self.pending_username = Some(name);
                        Vec::new()
                    }
                    _ => {
                        debug!(state = %self.state, "username already registered");
                        Vec::new()
                    }
                }
            }
            UserCommand::CreateRoom => self.lobby_only(Command::CreateRoom),
            UserCommand::JoinRoom(code) => {
                let code = code.trim().to_string();
                if code.is_empty() {
                    return Vec::new();
                }
                self.lobby_only(Command::JoinRoom(code))
            }
            UserCommand::ClickSquare(square) => self.click(square, now),
            UserCommand::Reset => {
                if self.state == SessionState::GameOver {
                    self.session.room = None;
                    self.session.assigned_color = None;
                    self.board = BoardState::initial();
                    self.intent.reset();
                    self.banner = None;
                    self.room_requested = false;
                    self.transition(SessionState::Lobby);
                }
                Vec::new()
            }
        }
    }

    fn lobby_only(&mut self, command: Command) -> Vec<Command> {
        if self.state == SessionState::Lobby {
            self.room_requested = true;
            vec![command]
        } else {
            debug!(state = %self.state, kind = command.kind(), "room command outside lobby");
            Vec::new()
        }
    }

    fn click(&mut self, square: Square, now: DateTime<Utc>) -> Vec<Command> {
        let outcome = if self.state == SessionState::InGame {
            self.intent
                .click(square, &self.board, self.session.assigned_color, now)
        } else {
            ClickOutcome::Ignored(Rejection::NotInGame)
        };
        match outcome {
            ClickOutcome::Send(command) => vec![command],
            ClickOutcome::Cancelled => Vec::new(),
            ClickOutcome::Ignored(rejection) => {
                self.raise(SessionError::LocalValidation(rejection), now);
                Vec::new()
            }
        }
    }

    fn register(&mut self, name: String) -> Vec<Command> {
        self.session.username = name.clone();
        self.transition(SessionState::Lobby);
        let mut commands = vec![Command::RegisterUsername(name)];

        match self.session.room.take() {
            Some(room) if room.status != RoomStatus::Finished => {
                commands.push(Command::JoinRoom(room.code.clone()));
                self.session.room = Some(room);
                self.transition(SessionState::WaitingForOpponent);
            }
            Some(_) => {
                self.session.assigned_color = None;
                self.board = BoardState::initial();
            }
            None => {}
        }
        commands
    }

    // -- timers --

    /// Expire stale legal-move queries and banners.
    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        if let Some(square) = self.intent.expire(now, self.legal_moves_timeout) {
            self.raise(SessionError::LegalMovesTimeout(square), now);
        }
        if self
            .banner
            .as_ref()
            .is_some_and(|b| b.is_expired(now, self.banner_ttl))
        {
            self.banner = None;
        }
    }

    // -- helpers --

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "session transition");
            self.state = next;
        }
    }

    fn raise(&mut self, err: SessionError, now: DateTime<Utc>) {
        match &err {
            SessionError::Protocol(_) => warn!("{err}"),
            SessionError::LocalValidation(_) => debug!("{err}"),
            SessionError::Application { .. }
            | SessionError::Connectivity(_)
            | SessionError::LegalMovesTimeout(_) => {
                warn!("{err}");
                self.banner = Some(Banner::from_error(&err, now));
            }
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        SessionStateMachine::new(&ClientConfig::default())
    }
}

fn status_max(a: RoomStatus, b: RoomStatus) -> RoomStatus {
    if b.code() > a.code() { b } else { a }
}

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::milliseconds(i64::try_from(d.as_millis()).unwrap_or(i64::MAX / 1_000))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Phase;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn room(name: &str, white: &str, black: &str, status: RoomStatus) -> Notification {
        Notification::RoomStatus(RoomSnapshot {
            name: name.into(),
            white: white.into(),
            black: black.into(),
            status: Some(status),
        })
    }

    fn teardown() -> Notification {
        Notification::RoomStatus(RoomSnapshot {
            name: String::new(),
            white: String::new(),
            black: String::new(),
            status: None,
        })
    }

    fn in_lobby(name: &str) -> SessionStateMachine {
        let mut m = SessionStateMachine::default();
        assert!(m.on_connection_opened().is_empty());
        let cmds = m.on_user_command(UserCommand::RegisterUsername(name.into()), Utc::now());
        assert_eq!(cmds, vec![Command::RegisterUsername(name.into())]);
        m
    }

    fn in_game_as_white() -> SessionStateMachine {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_notification(Notification::RoomCreated("ROOM1".into()), now);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.state(), SessionState::InGame);
        m
    }

    #[test]
    fn starts_connecting() {
        let m = SessionStateMachine::default();
        assert_eq!(m.state(), SessionState::Connecting);
        assert_eq!(m.session().connectivity, Connectivity::Disconnected);
        assert!(m.session().username.is_empty());
        assert!(m.session().room.is_none());
    }

    #[test]
    fn open_then_register_reaches_lobby() {
        let mut m = SessionStateMachine::default();
        m.on_connection_opened();
        assert_eq!(m.state(), SessionState::Authenticating);
        assert_eq!(m.session().connectivity, Connectivity::Connected);
        m.on_user_command(UserCommand::RegisterUsername("alice".into()), Utc::now());
        assert_eq!(m.state(), SessionState::Lobby);
        assert_eq!(m.session().username, "alice");
    }

    #[test]
    fn configured_username_registers_on_open() {
        let config = ClientConfig {
            username: Some("carol".into()),
            ..ClientConfig::default()
        };
        let mut m = SessionStateMachine::new(&config);
        let cmds = m.on_connection_opened();
        assert_eq!(cmds, vec![Command::RegisterUsername("carol".into())]);
        assert_eq!(m.state(), SessionState::Lobby);
    }

    #[test]
    fn username_given_while_connecting_is_used_on_open() {
        let mut m = SessionStateMachine::default();
        let cmds = m.on_user_command(UserCommand::RegisterUsername("dave".into()), Utc::now());
        assert!(cmds.is_empty());
        assert_eq!(
            m.on_connection_opened(),
            vec![Command::RegisterUsername("dave".into())]
        );
    }

    #[test]
    fn room_commands_only_from_lobby() {
        let mut m = SessionStateMachine::default();
        let now = Utc::now();
        assert!(m.on_user_command(UserCommand::CreateRoom, now).is_empty());
        let mut m = in_lobby("alice");
        assert_eq!(
            m.on_user_command(UserCommand::CreateRoom, now),
            vec![Command::CreateRoom]
        );
        assert_eq!(
            m.on_user_command(UserCommand::JoinRoom(" ABCD ".into()), now),
            vec![Command::JoinRoom("ABCD".into())]
        );
        assert!(m.on_user_command(UserCommand::JoinRoom("  ".into()), now).is_empty());
    }

    #[test]
    fn room_created_waits_for_opponent() {
        let mut m = in_lobby("alice");
        m.on_notification(Notification::RoomCreated("ROOM1".into()), Utc::now());
        assert_eq!(m.state(), SessionState::WaitingForOpponent);
        let room = m.session().room.as_ref().unwrap();
        assert_eq!(room.code, "ROOM1");
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn active_room_status_starts_game_and_assigns_color() {
        let m = in_game_as_white();
        assert_eq!(m.session().assigned_color, Some(Color::White));
        let room = m.session().room.as_ref().unwrap();
        assert_eq!(room.white, "alice");
        assert_eq!(room.black, "bob");
        assert_eq!(room.status, RoomStatus::Active);
    }

    #[test]
    fn black_player_gets_black() {
        let mut m = in_lobby("bob");
        let now = Utc::now();
        m.on_notification(Notification::RoomJoined("ROOM1".into()), now);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.session().assigned_color, Some(Color::Black));
    }

    #[test]
    fn unnamed_user_gets_no_color() {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_notification(Notification::RoomJoined("ROOM1".into()), now);
        m.on_notification(room("ROOM1", "carol", "dave", RoomStatus::Active), now);
        assert_eq!(m.session().assigned_color, None);
        assert_eq!(
            m.on_user_command(UserCommand::ClickSquare(sq("e2")), now),
            Vec::new()
        );
    }

    #[test]
    fn waiting_status_does_not_start_game() {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_notification(Notification::RoomCreated("ROOM1".into()), now);
        m.on_notification(room("ROOM1", "alice", "", RoomStatus::Waiting), now);
        assert_eq!(m.state(), SessionState::WaitingForOpponent);
    }

    #[test]
    fn duplicate_room_status_is_idempotent() {
        let mut m = in_game_as_white();
        let before = m.view();
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), Utc::now());
        assert_eq!(m.view(), before);
    }

    #[test]
    fn room_status_before_room_created_is_adopted() {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_user_command(UserCommand::CreateRoom, now);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.state(), SessionState::InGame);
        // the late acknowledgement changes nothing
        m.on_notification(Notification::RoomCreated("ROOM1".into()), now);
        assert_eq!(m.state(), SessionState::InGame);
    }

    #[test]
    fn unrequested_room_status_in_lobby_is_ignored() {
        let mut m = in_lobby("alice");
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), Utc::now());
        assert_eq!(m.state(), SessionState::Lobby);
        assert!(m.session().room.is_none());
    }

    #[test]
    fn room_status_for_other_players_is_not_adopted() {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_user_command(UserCommand::JoinRoom("ROOM2".into()), now);
        m.on_notification(room("ROOM2", "carol", "dave", RoomStatus::Active), now);
        assert_eq!(m.state(), SessionState::Lobby);
        assert!(m.session().room.is_none());
    }

    #[test]
    fn late_active_status_after_teardown_stays_in_lobby() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        m.on_notification(teardown(), now);
        let after_teardown = m.view();
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.view(), after_teardown);
        assert_eq!(m.state(), SessionState::Lobby);
    }

    #[test]
    fn late_active_status_after_reset_stays_in_lobby() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        let board = BoardState::from_snapshot("8/8/8/8/8/8/8/8 5").unwrap();
        m.on_notification(Notification::GameResult(board), now);
        m.on_user_command(UserCommand::Reset, now);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.state(), SessionState::Lobby);
        assert!(m.session().room.is_none());
    }

    #[test]
    fn failed_join_cancels_room_request() {
        let mut m = in_lobby("alice");
        let now = Utc::now();
        m.on_user_command(UserCommand::JoinRoom("NOPE".into()), now);
        m.on_notification(
            Notification::Error {
                kind: "joinRoom".into(),
                message: "room not found".into(),
            },
            now,
        );
        m.on_notification(room("NOPE", "alice", "bob", RoomStatus::Active), now);
        assert_eq!(m.state(), SessionState::Lobby);
    }

    #[test]
    fn teardown_after_game_over_keeps_final_position() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        let board = BoardState::from_snapshot("4k3/4Q3/4K3/8/8/8/8/8 3").unwrap();
        m.on_notification(Notification::GameResult(board.clone()), now);
        m.on_notification(teardown(), now);
        assert_eq!(m.state(), SessionState::GameOver);
        assert!(m.session().room.is_none());
        assert_eq!(m.board(), &board);
        m.on_user_command(UserCommand::Reset, now);
        assert_eq!(m.state(), SessionState::Lobby);
    }

    #[test]
    fn room_status_never_regresses_for_same_room() {
        let mut m = in_game_as_white();
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Waiting), Utc::now());
        assert_eq!(
            m.session().room.as_ref().map(|r| r.status),
            Some(RoomStatus::Active)
        );
        assert_eq!(m.state(), SessionState::InGame);
    }

    #[test]
    fn game_state_replaces_board_and_clears_selection() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        m.on_user_command(UserCommand::ClickSquare(sq("e2")), now);
        assert_eq!(m.intent().selected_square(), Some(sq("e2")));
        let board = BoardState::from_snapshot("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR 2")
            .unwrap();
        m.on_notification(Notification::GameState(board.clone()), now);
        assert_eq!(m.board(), &board);
        assert!(m.intent().is_idle());
        assert_eq!(m.state(), SessionState::InGame);
    }

    #[test]
    fn game_result_ends_game() {
        let mut m = in_game_as_white();
        let board = BoardState::from_snapshot("4k3/4Q3/4K3/8/8/8/8/8 3").unwrap();
        m.on_notification(Notification::GameResult(board), Utc::now());
        assert_eq!(m.state(), SessionState::GameOver);
        assert_eq!(m.board().phase(), Phase::WhiteWon);
        assert_eq!(
            m.session().room.as_ref().map(|r| r.status),
            Some(RoomStatus::Finished)
        );
    }

    #[test]
    fn reset_from_game_over_returns_to_lobby() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        let board = BoardState::from_snapshot("8/8/8/8/8/8/8/8 5").unwrap();
        m.on_notification(Notification::GameResult(board), now);
        m.on_user_command(UserCommand::Reset, now);
        assert_eq!(m.state(), SessionState::Lobby);
        assert!(m.session().room.is_none());
        assert_eq!(m.session().assigned_color, None);
        assert_eq!(m.board(), &BoardState::initial());
        assert_eq!(m.session().username, "alice");
    }

    #[test]
    fn reset_outside_game_over_is_ignored() {
        let mut m = in_game_as_white();
        m.on_user_command(UserCommand::Reset, Utc::now());
        assert_eq!(m.state(), SessionState::InGame);
    }

    #[test]
    fn teardown_returns_to_lobby_and_is_idempotent() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        m.on_user_command(UserCommand::ClickSquare(sq("e2")), now);
        m.on_notification(teardown(), now);
        let first = m.view();
        assert_eq!(first.state, SessionState::Lobby);
        assert!(first.session.room.is_none());
        assert_eq!(first.board, BoardState::initial());
        assert_eq!(first.selected, None);
        m.on_notification(teardown(), now);
        assert_eq!(m.view(), first);
    }

    #[test]
    fn error_notification_keeps_state_and_raises_banner() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        m.on_user_command(UserCommand::ClickSquare(sq("e2")), now);
        m.on_notification(
            Notification::Error {
                kind: "requestLegalMoves".into(),
                message: "Invalid piece".into(),
            },
            now,
        );
        assert_eq!(m.state(), SessionState::InGame);
        assert!(m.intent().is_idle());
        assert!(m.banner().unwrap().message.contains("Invalid piece"));
    }

    #[test]
    fn malformed_frame_is_dropped() {
        let mut m = in_game_as_white();
        let before = m.view();
        m.on_frame("{not json", Utc::now());
        m.on_frame(r#"{"type":"gameState","data":"8/8 1"}"#, Utc::now());
        assert_eq!(m.view(), before);
    }

    #[test]
    fn clicks_outside_game_send_nothing() {
        let mut m = in_lobby("alice");
        assert!(
            m.on_user_command(UserCommand::ClickSquare(sq("e2")), Utc::now())
                .is_empty()
        );
    }

    #[test]
    fn legal_moves_outside_game_are_dropped() {
        let mut m = in_lobby("alice");
        m.on_notification(Notification::LegalMoves(vec![sq("e3")]), Utc::now());
        assert!(m.intent().is_idle());
    }

    #[test]
    fn disconnect_keeps_username_and_clears_selection() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        m.on_user_command(UserCommand::ClickSquare(sq("e2")), now);
        m.on_connection_closed("reset by peer", now);
        assert_eq!(m.state(), SessionState::Connecting);
        assert_eq!(m.session().connectivity, Connectivity::Disconnected);
        assert_eq!(m.session().username, "alice");
        assert!(m.intent().is_idle());
        assert!(m.banner().is_some());
    }

    #[test]
    fn reconnect_reregisters_and_rejoins_room() {
        let mut m = in_game_as_white();
        m.on_connection_closed("gone", Utc::now());
        let cmds = m.on_connection_opened();
        assert_eq!(
            cmds,
            vec![
                Command::RegisterUsername("alice".into()),
                Command::JoinRoom("ROOM1".into())
            ]
        );
        assert_eq!(m.state(), SessionState::WaitingForOpponent);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), Utc::now());
        assert_eq!(m.state(), SessionState::InGame);
    }

    #[test]
    fn reconnect_after_finished_game_lands_in_lobby() {
        let mut m = in_game_as_white();
        let now = Utc::now();
        let board = BoardState::from_snapshot("8/8/8/8/8/8/8/8 4").unwrap();
        m.on_notification(Notification::GameResult(board), now);
        m.on_connection_closed("gone", now);
        let cmds = m.on_connection_opened();
        assert_eq!(cmds, vec![Command::RegisterUsername("alice".into())]);
        assert_eq!(m.state(), SessionState::Lobby);
        assert!(m.session().room.is_none());
    }

    #[test]
    fn tick_expires_query_and_banner() {
        let config = ClientConfig {
            legal_moves_timeout: std::time::Duration::from_secs(2),
            banner_ttl: std::time::Duration::from_secs(1),
            ..ClientConfig::default()
        };
        let mut m = SessionStateMachine::new(&config);
        m.on_connection_opened();
        let t0 = Utc::now();
        m.on_user_command(UserCommand::RegisterUsername("alice".into()), t0);
        m.on_user_command(UserCommand::CreateRoom, t0);
        m.on_notification(room("ROOM1", "alice", "bob", RoomStatus::Active), t0);
        m.on_user_command(UserCommand::ClickSquare(sq("e2")), t0);

        m.on_tick(t0 + Duration::seconds(1));
        assert!(!m.intent().is_idle());
        let t2 = t0 + Duration::seconds(2);
        m.on_tick(t2);
        assert!(m.intent().is_idle());
        assert!(m.banner().unwrap().message.contains("e2"));
        m.on_tick(t2 + Duration::seconds(1));
        assert!(m.banner().is_none());
    }
}
