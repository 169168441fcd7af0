//! Room configuration.

use serde::{Deserialize, Serialize};
use tickwire_tick::TickConfig;

use crate::RoomError;

/// Settings shared by every room a manager spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Tick cadence. Defaults to 60 Hz.
    pub tick: TickConfig,
    /// Capacity of the outbound command queue behind
    /// [`RoomOutbound`](crate::RoomOutbound).
    pub command_queue: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            command_queue: 1024,
        }
    }
}

impl RoomConfig {
    /// # Errors
    /// [`RoomError::InvalidConfig`] for a zero command queue and
    /// [`RoomError::Tick`] for an unusable tick rate.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.command_queue == 0 {
            return Err(RoomError::InvalidConfig("command_queue must be nonzero"));
        }
        self.tick.period()?;
        Ok(())
    }
}
