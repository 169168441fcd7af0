//! Transport abstraction layer for tickwire.
//!
//! A [`Transport`] is the byte-level I/O boundary of one client
//! connection: whole messages in, whole messages out. A [`Listener`]
//! produces transports for incoming clients.
//!
//! Reads and writes are called concurrently from different tasks on the
//! same `&Transport`, so implementations must not hold a single lock
//! across both directions.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketListener, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// WebSocket close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Opaque identifier for a transport, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single client connection that moves whole binary messages.
pub trait Transport: Send + Sync + 'static {
    /// Waits for the next message from the peer.
    ///
    /// # Errors
    /// [`TransportError::ConnectionClosed`] once the peer has gone away;
    /// every later call returns the same.
    fn read(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Sends one message to the peer.
    fn write(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection with a close code and reason.
    fn close(&self, code: u16, reason: &str)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    fn id(&self) -> ConnectionId;
}

/// Accepts incoming connections.
pub trait Listener: Send + 'static {
    /// The transport type produced by this listener.
    type Transport: Transport;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<(Self::Transport, SocketAddr), TransportError>> + Send;

    /// The address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
