//! Endpoint and heartbeat configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::EndpointError;

/// Settings for one [`SessionEndpoint`](crate::SessionEndpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Close the session when any activity timestamp is older than this.
    /// Zero disables idle detection.
    pub idle_timeout_ms: u64,
    /// How often the owner loop checks idleness.
    pub idle_check_interval_ms: u64,
    /// Capacity of the control-event queue.
    pub control_queue: usize,
    /// Capacity of the outbound write queue.
    pub outbound_queue: usize,
    /// Upper bound on the transport close handshake.
    pub close_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            idle_check_interval_ms: 1_000,
            control_queue: 16,
            outbound_queue: 1024,
            close_timeout_ms: 5_000,
        }
    }
}

impl EndpointConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// # Errors
    /// [`EndpointError::Initialization`] for zero queue sizes or a zero
    /// check interval.
    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.control_queue == 0 {
            return Err(EndpointError::Initialization(
                "control_queue must be nonzero".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(EndpointError::Initialization(
                "outbound_queue must be nonzero".into(),
            ));
        }
        if self.idle_check_interval_ms == 0 {
            return Err(EndpointError::Initialization(
                "idle_check_interval_ms must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for [`HeartbeatService`](crate::HeartbeatService).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_ms: 10_000 }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// # Errors
    /// [`EndpointError::Initialization`] for a zero interval.
    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.interval_ms == 0 {
            return Err(EndpointError::Initialization(
                "heartbeat interval must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
