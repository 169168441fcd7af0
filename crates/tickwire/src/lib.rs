//! # tickwire
//!
//! Real-time session transport: binary frames over WebSocket, routed
//! through a topic bus into fixed-rate rooms that drive your
//! [`Application`](tickwire_room::Application).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickwire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TickwireError> {
//!     tickwire::init_tracing();
//!     let server = Server::builder()
//!         .bind("0.0.0.0:8080")
//!         .build(EchoApplication::new())
//!         .await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Crates
//!
//! | crate | layer |
//! |---|---|
//! | [`protocol`] | wire codec and frame builders |
//! | [`transport`] | WebSocket and in-memory transports |
//! | [`pubsub`] | topic bus |
//! | [`tick`] | fixed-rate scheduler |
//! | [`room`] | rooms, applications, room managers |
//! | [`session`] | sessions, endpoints, heartbeats |

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::TickwireError;
pub use server::{Server, ServerBuilder};

pub use tickwire_protocol as protocol;
pub use tickwire_pubsub as pubsub;
pub use tickwire_room as room;
pub use tickwire_session as session;
pub use tickwire_tick as tick;
pub use tickwire_transport as transport;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, defaulting
/// to `info`. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

pub mod prelude {
    pub use crate::{Server, ServerBuilder, ServerConfig, TickwireError};
    pub use tickwire_protocol::{
        ControlSubType, DataType, Frame, Header, InputPayload, PayloadHeader, RoomId, SessionId,
        Wire,
    };
    pub use tickwire_room::{
        Application, ApplicationError, EchoApplication, RoomConfig, RoomContext, TickOutput,
    };
    pub use tickwire_session::{CloseReason, EndpointConfig, HeartbeatConfig};
}
