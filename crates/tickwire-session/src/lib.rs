//! Session handling for tickwire.
//!
//! This crate owns everything that lives exactly as long as one client
//! connection:
//!
//! 1. **[`Session`]**: identity, activity timestamps, close state
//! 2. **[`SessionEndpoint`]**: the four loops tying a transport to the bus
//! 3. **[`HeartbeatService`]**: periodic pings on the endpoint's queue
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (beside)       ← reached only through pub/sub topics
//!     ↕ bus
//! Session layer (this crate)
//!     ↕
//! Transport + protocol (below)
//! ```

mod config;
mod connection;
mod endpoint;
mod error;
mod events;
mod heartbeat;
mod idle;
mod session;

pub use config::{EndpointConfig, HeartbeatConfig};
pub use connection::Connection;
pub use endpoint::{OutboundQueue, SessionEndpoint};
pub use error::EndpointError;
pub use heartbeat::HeartbeatService;
pub use idle::{IdleReason, Idleness};
pub use session::{CloseReason, Session};
