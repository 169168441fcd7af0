//! A transport bound to one session.

use tickwire_protocol::SessionId;
use tickwire_transport::{ConnectionId, Transport, TransportError};

/// Pairs a [`Transport`] with the session it serves.
pub struct Connection<T: Transport> {
    session_id: SessionId,
    transport: T,
}

impl<T: Transport> Connection<T> {
    pub fn new(session_id: SessionId, transport: T) -> Self {
        Self {
            session_id,
            transport,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn id(&self) -> ConnectionId {
        self.transport.id()
    }

    pub async fn read(&self) -> Result<Vec<u8>, TransportError> {
        self.transport.read().await
    }

    pub async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.transport.write(data).await
    }

    pub async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.transport.close(code, reason).await
    }
}
