//! Server configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tickwire_pubsub::{PubSubConfig, PubSubError};
use tickwire_room::RoomConfig;
use tickwire_session::{EndpointConfig, HeartbeatConfig};

use crate::TickwireError;

/// Everything a [`Server`](crate::Server) needs, with defaults for every
/// field.
///
/// ```
/// let config = tickwire::ServerConfig::from_json(
///     r#"{ "bind_addr": "0.0.0.0:9000", "room": { "tick": { "rate_hz": 30 } } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.room.tick.rate_hz, 30);
/// assert_eq!(config.endpoint.outbound_queue, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub endpoint: EndpointConfig,
    pub heartbeat: HeartbeatConfig,
    pub room: RoomConfig,
    pub pubsub: PubSubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            endpoint: EndpointConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            room: RoomConfig::default(),
            pubsub: PubSubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// [`TickwireError::Config`] for malformed JSON and the layer's own
    /// error for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, TickwireError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TickwireError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), TickwireError> {
        self.endpoint.validate()?;
        self.heartbeat.validate()?;
        self.room.validate()?;
        if self.pubsub.subscriber_capacity == 0 {
            return Err(PubSubError::ZeroCapacity.into());
        }
        Ok(())
    }
}
