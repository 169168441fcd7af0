//! Periodic pings for one session.

use std::time::Duration;

use tickwire_protocol::{SessionId, encode_ping};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{EndpointError, HeartbeatConfig, OutboundQueue};

/// Pushes a control/Ping frame onto a session's outbound queue at a fixed
/// interval.
///
/// A full queue costs that ping only; idle detection on the endpoint
/// decides whether the peer is still alive.
pub struct HeartbeatService {
    session_id: SessionId,
    interval: Duration,
    outbound: OutboundQueue,
}

impl HeartbeatService {
    /// # Errors
    /// [`EndpointError::Initialization`] for a zero interval.
    pub fn new(config: &HeartbeatConfig, outbound: OutboundQueue) -> Result<Self, EndpointError> {
        config.validate()?;
        Ok(Self {
            session_id: outbound.session_id(),
            interval: config.interval(),
            outbound,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Pings until `cancel` fires or the endpoint's queue is gone.
    ///
    /// The first ping goes out one interval after the call.
    pub async fn run(self, cancel: CancellationToken) {
        let session_id = self.session_id;
        let mut ticks = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(%session_id, interval = ?self.interval, "heartbeat started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => {}
            }
            match self.outbound.try_push(encode_ping(session_id)) {
                Ok(()) => tracing::trace!(%session_id, "ping queued"),
                Err(EndpointError::Backpressure) => {
                    tracing::warn!(%session_id, "outbound queue full, ping dropped");
                }
                Err(_) => break,
            }
        }
        tracing::debug!(%session_id, "heartbeat stopped");
    }
}
