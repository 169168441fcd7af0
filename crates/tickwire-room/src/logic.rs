//! The `Application` trait: the domain logic a room drives.
//!
//! A room owns exactly one application and calls it from its tick loop
//! only, so implementations are plain `&mut self` code with no locking.
//! Everything an application needs from the room arrives through a
//! [`RoomContext`].

use std::collections::HashSet;

use bytes::Bytes;
use tickwire_protocol::{RoomId, SessionId};

use crate::{ApplicationError, RoomOutbound};

/// What the room should do after [`Application::tick`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TickOutput {
    /// Nothing to send this tick.
    #[default]
    Idle,
    /// Send these bytes to every member right away.
    Broadcast(Bytes),
}

impl TickOutput {
    /// `true` for [`TickOutput::Idle`] and for an empty broadcast.
    pub fn is_idle(&self) -> bool {
        match self {
            Self::Idle => true,
            Self::Broadcast(data) => data.is_empty(),
        }
    }
}

/// The room as seen from inside an application callback.
pub struct RoomContext<'a> {
    pub(crate) room_id: RoomId,
    pub(crate) tick: u64,
    pub(crate) members: &'a HashSet<SessionId>,
    pub(crate) outbound: &'a RoomOutbound,
}

impl RoomContext<'_> {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The tick being processed, starting at 1.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Current members, as of this tick's control phase.
    pub fn members(&self) -> &HashSet<SessionId> {
        self.members
    }

    /// Queue for sends that go out during the next tick's send phase.
    pub fn outbound(&self) -> &RoomOutbound {
        self.outbound
    }
}

/// Domain logic plugged into a room.
pub trait Application: Send + 'static {
    /// Handles one inbound frame from `session_id`.
    ///
    /// Errors are logged by the room and never stop it.
    fn handle_message(
        &mut self,
        ctx: &RoomContext<'_>,
        session_id: SessionId,
        payload: &[u8],
    ) -> Result<(), ApplicationError>;

    /// Called once per tick after inbound messages and queued sends.
    fn tick(&mut self, ctx: &RoomContext<'_>) -> TickOutput;

    /// A session entered the room. Default: no-op.
    fn on_join(&mut self, _ctx: &RoomContext<'_>, _session_id: SessionId) {}

    /// A session left the room. Default: no-op.
    fn on_leave(&mut self, _ctx: &RoomContext<'_>, _session_id: SessionId) {}
}

// ---------------------------------------------------------------------------
// EchoApplication
// ---------------------------------------------------------------------------

/// Broadcasts the most recent inbound frame on the next tick.
///
/// Only the last frame received between two ticks survives. Useful as a
/// loopback smoke test for clients.
#[derive(Debug, Default)]
pub struct EchoApplication {
    pending: Option<Bytes>,
}

impl EchoApplication {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Application for EchoApplication {
    fn handle_message(
        &mut self,
        _ctx: &RoomContext<'_>,
        _session_id: SessionId,
        payload: &[u8],
    ) -> Result<(), ApplicationError> {
        self.pending = Some(Bytes::copy_from_slice(payload));
        Ok(())
    }

    fn tick(&mut self, _ctx: &RoomContext<'_>) -> TickOutput {
        self.pending
            .take()
            .map_or(TickOutput::Idle, TickOutput::Broadcast)
    }
}
