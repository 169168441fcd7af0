//! The room loop: a fixed-rate batcher between the bus and one
//! application.
//!
//! Each tick runs four phases in this order:
//!
//! 1. **control**: drain `room:<id>:ctrl`, applying joins and leaves;
//! 2. **inbound**: drain `room:<id>`, handing each frame to the
//!    application;
//! 3. **send**: publish the outbound commands that were queued before
//!    this tick started;
//! 4. **tick**: call [`Application::tick`] and broadcast its output.
//!
//! None of the drains wait. Anything the application queues during tick
//! N goes out in tick N+1's send phase.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tickwire_protocol::{RoomId, SessionId};
use tickwire_pubsub::{Message, PubSub, Subscription, Topic};
use tickwire_tick::{TickConfig, Ticker};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::{Application, RoomConfig, RoomContext, RoomError, TickOutput};

// ---------------------------------------------------------------------------
// Control payloads
// ---------------------------------------------------------------------------

/// Membership notifications carried on a room's control topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomControl {
    Join,
    Leave,
}

impl RoomControl {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Join => b"join",
            Self::Leave => b"leave",
        }
    }

    /// Returns `None` for anything other than `join` / `leave`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            b"join" => Some(Self::Join),
            b"leave" => Some(Self::Leave),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum RoomCommand {
    Broadcast(Bytes),
    SendTo(SessionId, Bytes),
}

/// Producer handle for a room's outbound command queue.
///
/// Cheap to clone. Enqueueing never waits: a full queue returns
/// [`RoomError::Busy`] immediately.
#[derive(Debug, Clone)]
pub struct RoomOutbound {
    room_id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomOutbound {
    pub(crate) fn new(room_id: RoomId, tx: mpsc::Sender<RoomCommand>) -> Self {
        Self { room_id, tx }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Queues `data` for every member at the next send phase.
    pub fn enqueue_broadcast(&self, data: impl Into<Bytes>) -> Result<(), RoomError> {
        self.enqueue(RoomCommand::Broadcast(data.into()))
    }

    /// Queues `data` for one session at the next send phase.
    pub fn enqueue_send_to(
        &self,
        session_id: SessionId,
        data: impl Into<Bytes>,
    ) -> Result<(), RoomError> {
        self.enqueue(RoomCommand::SendTo(session_id, data.into()))
    }

    fn enqueue(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => RoomError::Busy(self.room_id),
            TrySendError::Closed(_) => RoomError::Closed(self.room_id),
        })
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// What one call to [`Room::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub controls: usize,
    pub messages: usize,
    pub sends: usize,
    pub broadcast: bool,
}

/// A fixed-rate room. Sole owner of its membership set and its
/// application.
pub struct Room<P: PubSub, A: Application> {
    id: RoomId,
    pubsub: Arc<P>,
    app: A,
    members: HashSet<SessionId>,
    control: Subscription,
    data: Subscription,
    commands: mpsc::Receiver<RoomCommand>,
    outbound: RoomOutbound,
    tick_config: TickConfig,
    tick: u64,
}

impl<P: PubSub, A: Application> Room<P, A> {
    /// Creates a room and subscribes it to its data and control topics.
    ///
    /// Subscribing here rather than in [`run`](Self::run) means nothing
    /// published between creation and the first tick is lost.
    ///
    /// # Errors
    /// Rejects invalid [`RoomConfig`] values.
    pub fn new(id: RoomId, pubsub: Arc<P>, app: A, config: &RoomConfig) -> Result<Self, RoomError> {
        config.validate()?;
        let (tx, commands) = mpsc::channel(config.command_queue);
        let control = pubsub.subscribe(&Topic::room_control(&id));
        let data = pubsub.subscribe(&Topic::room(&id));
        Ok(Self {
            id,
            pubsub,
            app,
            members: HashSet::new(),
            control,
            data,
            commands,
            outbound: RoomOutbound::new(id, tx),
            tick_config: config.tick.clone(),
            tick: 0,
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// A producer handle for this room's outbound queue.
    pub fn outbound(&self) -> RoomOutbound {
        self.outbound.clone()
    }

    pub fn members(&self) -> &HashSet<SessionId> {
        &self.members
    }

    pub fn application(&self) -> &A {
        &self.app
    }

    /// Runs one tick: control, inbound, send, application tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        // Snapshot before the application runs so its sends wait a tick.
        let carried: Vec<RoomCommand> =
            std::iter::from_fn(|| self.commands.try_recv().ok()).collect();

        // control
        while let Some(msg) = self.control.try_recv() {
            report.controls += 1;
            self.apply_control(msg);
        }

        // inbound
        while let Some(msg) = self.data.try_recv() {
            report.messages += 1;
            let Some(session_id) = msg.session_id else {
                tracing::warn!(room_id = %self.id, "data message without session, dropped");
                continue;
            };
            let ctx = RoomContext {
                room_id: self.id,
                tick: self.tick,
                members: &self.members,
                outbound: &self.outbound,
            };
            if let Err(e) = self.app.handle_message(&ctx, session_id, &msg.payload) {
                tracing::warn!(room_id = %self.id, %session_id, error = %e, "application rejected message");
            }
        }

        // send
        report.sends = carried.len();
        for cmd in carried {
            match cmd {
                RoomCommand::Broadcast(data) => self.broadcast(&data),
                RoomCommand::SendTo(session_id, data) => self.send_to(session_id, data),
            }
        }

        // application tick
        let ctx = RoomContext {
            room_id: self.id,
            tick: self.tick,
            members: &self.members,
            outbound: &self.outbound,
        };
        match self.app.tick(&ctx) {
            TickOutput::Broadcast(data) if !data.is_empty() => {
                self.broadcast(&data);
                report.broadcast = true;
            }
            _ => {}
        }

        tracing::trace!(
            room_id = %self.id,
            tick = report.tick,
            controls = report.controls,
            messages = report.messages,
            sends = report.sends,
            "room tick"
        );
        report
    }

    /// Ticks at the configured rate until `cancel` fires, then detaches
    /// from the bus.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), RoomError> {
        let mut ticker = Ticker::new(&self.tick_config)?;
        tracing::info!(room_id = %self.id, rate_hz = self.tick_config.rate_hz, "room started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.wait_for_tick() => {
                    self.tick();
                    ticker.record_tick_end();
                }
            }
        }

        self.pubsub
            .unsubscribe(&Topic::room_control(&self.id), &self.control);
        self.pubsub.unsubscribe(&Topic::room(&self.id), &self.data);
        tracing::info!(
            room_id = %self.id,
            ticks = ticker.tick_count(),
            members = self.members.len(),
            "room stopped"
        );
        Ok(())
    }

    fn apply_control(&mut self, msg: Message) {
        let Some(session_id) = msg.session_id else {
            tracing::warn!(room_id = %self.id, "control message without session, dropped");
            return;
        };
        let control = match RoomControl::parse(&msg.payload) {
            Some(control) => control,
            None => {
                tracing::debug!(room_id = %self.id, %session_id, "ignoring unknown control payload");
                return;
            }
        };
        let changed = match control {
            RoomControl::Join => self.members.insert(session_id),
            RoomControl::Leave => self.members.remove(&session_id),
        };
        if !changed {
            return;
        }

        let ctx = RoomContext {
            room_id: self.id,
            tick: self.tick,
            members: &self.members,
            outbound: &self.outbound,
        };
        match control {
            RoomControl::Join => self.app.on_join(&ctx, session_id),
            RoomControl::Leave => self.app.on_leave(&ctx, session_id),
        }
        tracing::info!(
            room_id = %self.id,
            %session_id,
            action = ?control,
            members = self.members.len(),
            "room membership changed"
        );
    }

    fn broadcast(&self, data: &Bytes) {
        for session_id in &self.members {
            self.pubsub
                .publish(&Topic::session(session_id), Message::anonymous(data.clone()));
        }
    }

    fn send_to(&self, session_id: SessionId, data: Bytes) {
        self.pubsub
            .publish(&Topic::session(&session_id), Message::anonymous(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_control_parse_known_payloads() {
        assert_eq!(RoomControl::parse(b"join"), Some(RoomControl::Join));
        assert_eq!(RoomControl::parse(b"leave"), Some(RoomControl::Leave));
        assert_eq!(RoomControl::parse(b"JOIN"), None);
        assert_eq!(RoomControl::parse(b""), None);
    }

    #[test]
    fn test_room_control_bytes_round_trip() {
        for ctl in [RoomControl::Join, RoomControl::Leave] {
            assert_eq!(RoomControl::parse(ctl.as_bytes()), Some(ctl));
        }
    }

    #[test]
    fn test_enqueue_on_full_queue_returns_busy() {
        let room = RoomId::new_random();
        let (tx, _rx) = mpsc::channel(1);
        let outbound = RoomOutbound::new(room, tx);
        outbound.enqueue_broadcast(&b"a"[..]).unwrap();
        assert!(matches!(
            outbound.enqueue_broadcast(&b"b"[..]),
            Err(RoomError::Busy(id)) if id == room
        ));
    }

    #[test]
    fn test_enqueue_after_room_dropped_returns_closed() {
        let room = RoomId::new_random();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let outbound = RoomOutbound::new(room, tx);
        assert!(matches!(
            outbound.enqueue_send_to(SessionId::new_random(), &b"x"[..]),
            Err(RoomError::Closed(_))
        ));
    }
}
