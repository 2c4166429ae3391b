//! Session layer: lifecycle state machine, move intent and error reporting.

pub mod errors;
pub mod intent;
pub mod state;

pub use errors::{Banner, Rejection, SessionError};
pub use intent::{ClickOutcome, IntentState, MoveIntentController};
pub use state::{
    Connectivity, Room, Session, SessionState, SessionStateMachine, SessionView, UserCommand,
};
