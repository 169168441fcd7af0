//! Fixed-rate rooms for tickwire.
//!
//! A room turns the bursty stream of frames its members publish into
//! deterministic per-tick batches for an injected [`Application`], and
//! broadcasts what the application produces back over the bus.
//!
//! # Key types
//!
//! - [`Application`]: the domain logic a room drives
//! - [`Room`]: the tick loop; sole owner of membership
//! - [`RoomOutbound`]: non-blocking producer handle for a room's sends
//! - [`RoomManager`]: resolves a session to a room
//! - [`LocalRoomManager`]: spawns and tracks room tasks
//! - [`RoomConfig`]: tick rate and queue sizes

mod config;
mod error;
mod logic;
mod manager;
mod room;

pub use config::RoomConfig;
pub use error::{ApplicationError, RoomError};
pub use logic::{Application, EchoApplication, RoomContext, TickOutput};
pub use manager::{LocalRoomManager, RoomManager, StaticRoomManager};
pub use room::{Room, RoomControl, RoomOutbound, TickReport};
