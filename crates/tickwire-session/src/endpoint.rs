//! The per-connection endpoint.
//!
//! A [`SessionEndpoint`] runs four loops for the lifetime of one
//! connection:
//!
//! ```text
//!            ┌──────────── control events ────────────┐
//!            ▼                                        │
//!      owner loop ── idle check, close sequence       │
//!                                                     │
//!  transport ──► read loop ──► bus (room topics) ─────┤
//!  transport ◄── write loop ◄── outbound queue ◄──────┤
//!                                   ▲                 │
//!        bus (session topic) ──► subscribe loop ──────┘
//! ```
//!
//! Only the owner loop runs the close sequence. The other loops report
//! what they see through the control-event queue and stop when the
//! shared cancellation token fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tickwire_protocol::{
    ControlSubType, DataType, Frame, JoinPayload, RoomId, SessionId, Wire, encode_assign,
    encode_pong,
};
use tickwire_pubsub::{Message, PubSub, Subscription, Topic};
use tickwire_room::{RoomControl, RoomManager};
use tickwire_transport::{CLOSE_NORMAL, Transport};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::EndpointEvent;
use crate::{CloseReason, Connection, EndpointConfig, EndpointError, Idleness, Session};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// OutboundQueue
// ---------------------------------------------------------------------------

/// Producer handle for an endpoint's outbound write queue.
///
/// Cheap to clone. Pushing never waits.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    session_id: SessionId,
    tx: mpsc::Sender<Bytes>,
}

impl OutboundQueue {
    pub(crate) fn new(session_id: SessionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queues a frame for the write loop.
    ///
    /// # Errors
    /// [`EndpointError::Backpressure`] when the queue is full and
    /// [`EndpointError::Closed`] once the write loop has stopped.
    pub fn try_push(&self, data: impl Into<Bytes>) -> Result<(), EndpointError> {
        self.tx.try_send(data.into()).map_err(|e| match e {
            TrySendError::Full(_) => EndpointError::Backpressure,
            TrySendError::Closed(_) => EndpointError::Closed,
        })
    }
}

// ---------------------------------------------------------------------------
// SessionEndpoint
// ---------------------------------------------------------------------------

/// Connects one transport to the bus on behalf of one session.
pub struct SessionEndpoint<T: Transport, P: PubSub, R: RoomManager> {
    session: Arc<Session>,
    connection: Connection<T>,
    pubsub: Arc<P>,
    rooms: Arc<R>,
    config: EndpointConfig,
    cancel: CancellationToken,
    closed: AtomicBool,
    room: Mutex<Option<RoomId>>,
    ctrl_tx: mpsc::Sender<EndpointEvent>,
    ctrl_rx: Mutex<Option<mpsc::Receiver<EndpointEvent>>>,
    outbound: OutboundQueue,
    write_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl<T: Transport, P: PubSub, R: RoomManager> SessionEndpoint<T, P, R> {
    /// Builds an endpoint. Nothing runs until [`run`](Self::run).
    ///
    /// # Errors
    /// [`EndpointError::Initialization`] if the config is invalid, the
    /// connection belongs to another session, or the session is already
    /// closed.
    pub fn new(
        session: Arc<Session>,
        connection: Connection<T>,
        pubsub: Arc<P>,
        rooms: Arc<R>,
        config: EndpointConfig,
    ) -> Result<Self, EndpointError> {
        config.validate()?;
        if connection.session_id() != session.id() {
            return Err(EndpointError::Initialization(format!(
                "connection is bound to session {}, expected {}",
                connection.session_id(),
                session.id()
            )));
        }
        if session.is_closed() {
            return Err(EndpointError::Initialization(format!(
                "session {} is already closed",
                session.id()
            )));
        }

        let (ctrl_tx, ctrl_rx) = mpsc::channel(config.control_queue);
        let (write_tx, write_rx) = mpsc::channel(config.outbound_queue);
        Ok(Self {
            outbound: OutboundQueue::new(session.id(), write_tx),
            session,
            connection,
            pubsub,
            rooms,
            config,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            room: Mutex::new(None),
            ctrl_tx,
            ctrl_rx: Mutex::new(Some(ctrl_rx)),
            write_rx: Mutex::new(Some(write_rx)),
        })
    }

    /// Ties the endpoint's lifetime to `parent`: cancelling it closes the
    /// endpoint with [`CloseReason::Shutdown`].
    pub fn with_shutdown(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The room this endpoint last joined, if any.
    pub fn current_room(&self) -> Option<RoomId> {
        *lock(&self.room)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A handle other producers, such as the heartbeat, can push on.
    pub fn outbound(&self) -> OutboundQueue {
        self.outbound.clone()
    }

    /// Fires when the endpoint shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Queues a frame for the peer without waiting.
    ///
    /// # Errors
    /// [`EndpointError::Backpressure`] if the outbound queue is full.
    pub fn send(&self, data: impl Into<Bytes>) -> Result<(), EndpointError> {
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }
        self.outbound.try_push(data)
    }

    /// Asks the owner loop to close the endpoint.
    pub async fn close(&self) {
        self.report(EndpointEvent::Close(CloseReason::Requested)).await;
    }

    /// Runs the close sequence now, without going through the owner loop.
    pub async fn force_close(&self) {
        self.shutdown(CloseReason::Forced).await;
    }

    /// Starts the four loops and waits for all of them to stop.
    ///
    /// The first frame written is an Assign carrying the session id.
    ///
    /// # Errors
    /// [`EndpointError::AlreadyRunning`] on a second call,
    /// [`EndpointError::Closed`] if the endpoint was closed before it
    /// started, and [`EndpointError::LoopFailed`] if a loop panicked.
    pub async fn run(self: Arc<Self>) -> Result<(), EndpointError> {
        let ctrl_rx = lock(&self.ctrl_rx).take();
        let write_rx = lock(&self.write_rx).take();
        let (Some(ctrl_rx), Some(write_rx)) = (ctrl_rx, write_rx) else {
            return Err(EndpointError::AlreadyRunning);
        };
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }

        let session_id = self.session.id();
        let subscription = self.pubsub.subscribe(&Topic::session(&session_id));
        self.outbound.try_push(encode_assign(session_id))?;
        tracing::info!(
            %session_id,
            connection = %self.connection.id(),
            "session endpoint started"
        );

        let mut loops = JoinSet::new();
        loops.spawn(Arc::clone(&self).owner_loop(ctrl_rx));
        loops.spawn(Arc::clone(&self).read_loop());
        loops.spawn(Arc::clone(&self).write_loop(write_rx));
        loops.spawn(Arc::clone(&self).subscribe_loop(subscription));

        let mut failure = None;
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%session_id, error = %e, "endpoint loop panicked");
                self.cancel.cancel();
                failure.get_or_insert_with(|| EndpointError::LoopFailed(e.to_string()));
            }
        }

        // No-op unless the loops were stopped from outside.
        self.shutdown(CloseReason::Shutdown).await;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // -- owner ---------------------------------------------------------------

    async fn owner_loop(self: Arc<Self>, mut events: mpsc::Receiver<EndpointEvent>) {
        let period = self.config.idle_check_interval();
        let mut idle_check = time::interval_at(Instant::now() + period, period);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(event) = events.recv() => self.handle_event(event).await,
                _ = idle_check.tick() => {
                    if let Idleness::Idle(reason) = self.session.idleness(self.config.idle_timeout()) {
                        tracing::warn!(
                            session_id = %self.session.id(),
                            idle = %reason,
                            "session idle, closing"
                        );
                        self.handle_event(EndpointEvent::Close(CloseReason::Idle)).await;
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: EndpointEvent) {
        let session_id = self.session.id();
        match event {
            EndpointEvent::Pong => self.session.touch_pong(),
            EndpointEvent::ReadError(e) if e.is_terminal() => {
                tracing::info!(%session_id, error = %e, "peer disconnected");
                self.shutdown(CloseReason::PeerClosed).await;
            }
            EndpointEvent::ReadError(e) => {
                tracing::warn!(%session_id, error = %e, "read failed");
            }
            EndpointEvent::WriteError(e) => {
                tracing::warn!(%session_id, error = %e, "write failed");
            }
            EndpointEvent::DispatchError(reason) => {
                tracing::warn!(%session_id, %reason, "frame dispatch failed");
            }
            EndpointEvent::Close(reason) => self.shutdown(reason).await,
        }
    }

    /// The close sequence. Runs at most once.
    async fn shutdown(&self, reason: CloseReason) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let session_id = self.session.id();

        let room = lock(&self.room).take();
        if let Some(room) = room {
            self.publish_control(room, RoomControl::Leave);
        }
        self.cancel.cancel();
        self.session.close(reason);
        let close_timeout = self.config.close_timeout();
        match time::timeout(close_timeout, self.connection.close(CLOSE_NORMAL, "")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(%session_id, error = %e, "closing connection failed"),
            Err(_) => tracing::warn!(
                %session_id,
                timeout_ms = close_timeout.as_millis() as u64,
                "close handshake timed out"
            ),
        }
        tracing::info!(%session_id, %reason, "session endpoint closed");
    }

    async fn report(&self, event: EndpointEvent) {
        tokio::select! {
            _ = self.ctrl_tx.send(event) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    // -- read ----------------------------------------------------------------

    async fn read_loop(self: Arc<Self>) {
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.connection.read() => result,
            };
            match result {
                Ok(data) => {
                    self.session.touch_read();
                    self.handle_frame(&Bytes::from(data)).await;
                }
                Err(e) => {
                    let terminal = e.is_terminal();
                    self.report(EndpointEvent::ReadError(e)).await;
                    if terminal {
                        self.cancel.cancelled().await;
                        break;
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, data: &Bytes) {
        let session_id = self.session.id();
        let frame = match Frame::parse(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "malformed frame dropped");
                return;
            }
        };
        if frame.header.session_id != session_id {
            tracing::warn!(
                %session_id,
                claimed = %frame.header.session_id,
                "session id mismatch, frame dropped"
            );
            return;
        }

        match frame.payload_header.kind() {
            Ok(DataType::Control) => {
                self.handle_control(frame.payload_header.sub_type, frame.body)
                    .await;
            }
            Ok(kind) => self.forward_to_room(kind, data),
            Err(e) => tracing::warn!(%session_id, error = %e, "frame dropped"),
        }
    }

    async fn handle_control(&self, sub_type: u8, body: &[u8]) {
        let session_id = self.session.id();
        match ControlSubType::try_from(sub_type) {
            Ok(ControlSubType::Join) => self.join(body).await,
            Ok(ControlSubType::Leave) => self.leave(),
            Ok(ControlSubType::Ping) => {
                if let Err(e) = self.send(encode_pong(session_id)) {
                    tracing::warn!(%session_id, error = %e, "pong dropped");
                }
            }
            Ok(ControlSubType::Pong) => self.report(EndpointEvent::Pong).await,
            Ok(ControlSubType::Kick) => {
                tracing::info!(%session_id, "peer asked to be disconnected");
                self.report(EndpointEvent::Close(CloseReason::Kicked)).await;
            }
            Ok(ControlSubType::Error) => {
                tracing::warn!(
                    %session_id,
                    message = %String::from_utf8_lossy(body),
                    "peer reported an error"
                );
            }
            Ok(ControlSubType::Assign) => {
                tracing::debug!(%session_id, "ignoring assign from peer");
            }
            Err(e) => tracing::warn!(%session_id, error = %e, "control frame dropped"),
        }
    }

    async fn join(&self, body: &[u8]) {
        let session_id = self.session.id();
        let payload = match JoinPayload::decode(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "malformed join dropped");
                return;
            }
        };

        let room = if payload.room_id.is_unassigned() {
            match self.rooms.get_room(session_id).await {
                Ok(room) => room,
                Err(e) => {
                    self.report(EndpointEvent::DispatchError(format!(
                        "no room to auto-assign: {e}"
                    )))
                    .await;
                    return;
                }
            }
        } else {
            payload.room_id
        };

        let previous = lock(&self.room).replace(room);
        match previous {
            Some(old) if old == room => {
                tracing::debug!(%session_id, room_id = %room, "already in room");
                return;
            }
            Some(old) => self.publish_control(old, RoomControl::Leave),
            None => {}
        }
        self.publish_control(room, RoomControl::Join);
        tracing::info!(%session_id, room_id = %room, "joined room");
    }

    fn leave(&self) {
        let session_id = self.session.id();
        let room = lock(&self.room).take();
        match room {
            Some(room) => {
                self.publish_control(room, RoomControl::Leave);
                tracing::info!(%session_id, room_id = %room, "left room");
            }
            None => tracing::debug!(%session_id, "leave without a room ignored"),
        }
    }

    fn forward_to_room(&self, kind: DataType, data: &Bytes) {
        let session_id = self.session.id();
        let Some(room) = self.current_room() else {
            tracing::warn!(%session_id, ?kind, "frame before join dropped");
            return;
        };
        let delivered = self.pubsub.publish(
            &Topic::room(&room),
            Message::from_session(session_id, data.clone()),
        );
        tracing::debug!(%session_id, room_id = %room, ?kind, delivered, "frame forwarded");
    }

    fn publish_control(&self, room: RoomId, control: RoomControl) {
        let delivered = self.pubsub.publish(
            &Topic::room_control(&room),
            Message::from_session(self.session.id(), control.as_bytes()),
        );
        if delivered == 0 {
            tracing::debug!(
                session_id = %self.session.id(),
                room_id = %room,
                ?control,
                "no room listening for control message"
            );
        }
    }

    // -- write ---------------------------------------------------------------

    async fn write_loop(self: Arc<Self>, mut frames: mpsc::Receiver<Bytes>) {
        loop {
            let data = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                data = frames.recv() => match data {
                    Some(data) => data,
                    None => break,
                },
            };
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.connection.write(&data) => result,
            };
            match result {
                Ok(()) => self.session.touch_write(),
                Err(e) => self.report(EndpointEvent::WriteError(e)).await,
            }
        }
    }

    // -- subscribe -----------------------------------------------------------

    async fn subscribe_loop(self: Arc<Self>, mut subscription: Subscription) {
        let session_id = self.session.id();
        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = subscription.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            match self.outbound.try_push(message.payload) {
                Ok(()) => {}
                Err(EndpointError::Backpressure) => {
                    tracing::warn!(%session_id, "outbound queue full, message dropped");
                }
                Err(_) => break,
            }
        }
        self.pubsub.unsubscribe(subscription.topic(), &subscription);
    }
}
