//! Error types for the room layer.

use tickwire_protocol::{ProtocolError, RoomId};
use tickwire_tick::TickError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's outbound command queue is full. The command was not
    /// queued; the caller decides whether to retry.
    #[error("room {0} send queue is full")]
    Busy(RoomId),

    /// The room has stopped and no longer accepts commands.
    #[error("room {0} is closed")]
    Closed(RoomId),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Auto-assignment was requested but no default room is set.
    #[error("no default room available")]
    NoDefaultRoom,

    /// A room with this id is already running.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("invalid room config: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Tick(#[from] TickError),
}

/// Errors an [`Application`](crate::Application) returns from
/// `handle_message`. The room logs them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// The payload isn't a frame the application understands.
    #[error("malformed message: {0}")]
    Malformed(#[from] ProtocolError),

    /// The message was well formed but refused by application rules.
    #[error("message rejected: {0}")]
    Rejected(String),
}
