//! WebSocket module: the wire side of the client.
//!
//! - [`messages`]: Typed command/notification envelopes.
//! - [`connection`]: Connection supervision, keepalive and reconnects.

pub mod connection;
pub mod messages;

pub use connection::{Backoff, ConnectionEvent, ConnectionHandle, ConnectionSupervisor};
pub use messages::{Command, Envelope, Notification, ProtocolError, RoomSnapshot, RoomStatus};
