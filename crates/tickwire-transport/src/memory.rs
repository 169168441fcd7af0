//! An in-process transport pair for tests and local wiring.
//!
//! [`MemoryTransport::pair`] returns the server side (a [`Transport`]) and
//! a [`MemoryPeer`] that plays the client: it feeds inbound messages,
//! observes what the server wrote, injects faults and sees the close
//! frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, watch};

use crate::{ConnectionId, Transport, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

enum Inbound {
    Data(Vec<u8>),
    Fault(String),
}

struct Shared {
    fail_writes: AtomicBool,
    writes_paused: watch::Sender<bool>,
}

/// The server side of an in-memory connection.
pub struct MemoryTransport {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: watch::Sender<Option<(u16, String)>>,
    shared: Arc<Shared>,
}

/// The client side of an in-memory connection.
///
/// Dropping the peer looks like the client disconnecting: the next
/// [`Transport::read`] returns `ConnectionClosed`.
pub struct MemoryPeer {
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: watch::Receiver<Option<(u16, String)>>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            fail_writes: AtomicBool::new(false),
            writes_paused: watch::Sender::new(false),
        });

        let transport = MemoryTransport {
            id: ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed)),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            closed: closed_tx,
            shared: Arc::clone(&shared),
        };
        let peer = MemoryPeer {
            inbound: in_tx,
            outbound: out_rx,
            closed: closed_rx,
            shared,
        };
        (transport, peer)
    }

    fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }
}

impl Transport for MemoryTransport {
    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        let mut closed = self.closed.subscribe();
        if closed.borrow().is_some() {
            return Err(TransportError::Shutdown);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            msg = inbound.recv() => match msg {
                Some(Inbound::Data(data)) => Ok(data),
                Some(Inbound::Fault(reason)) => {
                    Err(TransportError::ReceiveFailed(std::io::Error::other(reason)))
                }
                None => Err(TransportError::ConnectionClosed("peer dropped".into())),
            },
            _ = closed.wait_for(Option::is_some) => {
                Err(TransportError::Shutdown)
            }
        }
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut paused = self.shared.writes_paused.subscribe();
        let resumed = paused.wait_for(|&paused| !paused).await.is_ok();
        if !resumed || self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::SendFailed(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        self.closed.send_replace(Some((code, reason.to_owned())));
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// Delivers a message to the server's next `read`. Returns `false` if
    /// the server side is gone.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        self.inbound.send(Inbound::Data(data.into())).is_ok()
    }

    /// Makes the server's next `read` fail with a non-terminal error.
    pub fn inject_read_error(&self, reason: &str) -> bool {
        self.inbound.send(Inbound::Fault(reason.to_owned())).is_ok()
    }

    /// While set, every server `write` fails.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Release);
    }

    /// While set, every server `write` waits, like a client that has
    /// stopped reading.
    pub fn pause_writes(&self, paused: bool) {
        self.shared.writes_paused.send_replace(paused);
    }

    /// Waits for the next message the server wrote. `None` once the
    /// server side is dropped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Takes a written message without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }

    /// The close code and reason, if the server closed the connection.
    pub fn close_frame(&self) -> Option<(u16, String)> {
        self.closed.borrow().clone()
    }

    /// Waits until the server closes the connection.
    pub async fn closed(&mut self) -> Option<(u16, String)> {
        let frame = self.closed.wait_for(Option::is_some).await.ok()?;
        frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_returns_peer_data_in_order() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send(b"one".to_vec());
        peer.send(b"two".to_vec());
        assert_eq!(transport.read().await.unwrap(), b"one");
        assert_eq!(transport.read().await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_read_after_peer_drop_is_terminal() {
        let (transport, peer) = MemoryTransport::pair();
        drop(peer);
        let err = transport.read().await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_injected_read_error_is_not_terminal() {
        let (transport, peer) = MemoryTransport::pair();
        peer.inject_read_error("glitch");
        peer.send(b"after".to_vec());
        let err = transport.read().await.unwrap_err();
        assert!(!err.is_terminal());
        assert_eq!(transport.read().await.unwrap(), b"after");
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (transport, mut peer) = MemoryTransport::pair();
        transport.write(b"hi").await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_fail_writes_makes_write_error() {
        let (transport, peer) = MemoryTransport::pair();
        peer.fail_writes(true);
        assert!(matches!(
            transport.write(b"x").await,
            Err(TransportError::SendFailed(_))
        ));
        peer.fail_writes(false);
        assert!(transport.write(b"x").await.is_ok());
    }

    #[tokio::test]
    async fn test_paused_writes_wait_until_resumed() {
        let (transport, mut peer) = MemoryTransport::pair();
        let transport = Arc::new(transport);
        peer.pause_writes(true);

        let writer = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.write(b"held").await })
        };
        tokio::task::yield_now().await;
        assert!(!writer.is_finished());
        assert!(peer.try_recv().is_none());

        peer.pause_writes(false);
        writer.await.unwrap().unwrap();
        assert_eq!(peer.recv().await.unwrap(), b"held");
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read_and_records_frame() {
        let (transport, mut peer) = MemoryTransport::pair();
        let transport = Arc::new(transport);

        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.read().await })
        };
        tokio::task::yield_now().await;

        transport.close(1000, "bye").await.unwrap();
        assert!(matches!(
            reader.await.unwrap(),
            Err(TransportError::Shutdown)
        ));
        assert_eq!(peer.closed().await, Some((1000, "bye".to_owned())));
        assert!(matches!(
            transport.write(b"late").await,
            Err(TransportError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_second_close_returns_error() {
        let (transport, _peer) = MemoryTransport::pair();
        transport.close(1000, "").await.unwrap();
        assert!(matches!(
            transport.close(1000, "").await,
            Err(TransportError::Shutdown)
        ));
    }
}
