//! Unified error type for tickwire.

use tickwire_protocol::ProtocolError;
use tickwire_pubsub::PubSubError;
use tickwire_room::{ApplicationError, RoomError};
use tickwire_session::EndpointError;
use tickwire_tick::TickError;
use tickwire_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum TickwireError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    PubSub(#[from] PubSubError),

    #[error(transparent)]
    Tick(#[from] TickError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("reading configuration: {0}")]
    Io(#[from] std::io::Error),
}
