//! # tickwire-pubsub
//!
//! A topic-addressed message bus. Sessions and rooms never hold references
//! to each other: an endpoint publishes on a room's topics, the room
//! publishes on session topics, and each side consumes its own
//! [`Subscription`].
//!
//! ## Topics
//!
//! | topic              | producer            | consumer           |
//! |--------------------|---------------------|--------------------|
//! | `session:<id>`     | rooms               | that session       |
//! | `room:<id>`        | session endpoints   | that room (data)   |
//! | `room:<id>:ctrl`   | session endpoints   | that room (joins)  |
//!
//! Every subscriber owns a bounded FIFO channel. Publishing never blocks:
//! a subscriber whose channel is full misses that message and nobody else
//! is affected.

mod memory;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use tickwire_protocol::{RoomId, SessionId};

pub use memory::MemoryPubSub;

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// The string key partitioning the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Point-to-point topic for one session: `session:<id>`.
    pub fn session(id: &SessionId) -> Self {
        Self(format!("session:{id}"))
    }

    /// A room's data topic: `room:<id>`.
    pub fn room(id: &RoomId) -> Self {
        Self(format!("room:{id}"))
    }

    /// A room's join/leave topic: `room:<id>:ctrl`.
    pub fn room_control(id: &RoomId) -> Self {
        Self(format!("room:{id}:ctrl"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An envelope on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The session that produced the payload. `None` for room broadcasts.
    pub session_id: Option<SessionId>,
    pub payload: Bytes,
}

impl Message {
    /// A message produced by a session.
    pub fn from_session(session_id: SessionId, payload: impl Into<Bytes>) -> Self {
        Self {
            session_id: Some(session_id),
            payload: payload.into(),
        }
    }

    /// A message with no originating session.
    pub fn anonymous(payload: impl Into<Bytes>) -> Self {
        Self {
            session_id: None,
            payload: payload.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Identifies one subscription within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A subscriber's private, ordered view of one topic.
///
/// Dropping the subscription closes its channel; the bus prunes it on the
/// next publish. Call [`PubSub::unsubscribe`] to detach eagerly.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, topic: Topic, rx: mpsc::Receiver<Message>) -> Self {
        Self { id, topic, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Waits for the next message. Returns `None` once unsubscribed and
    /// drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Takes the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Bus contract
// ---------------------------------------------------------------------------

/// The publish/subscribe contract shared by endpoints and rooms.
///
/// Implementations must be safe to call from any task. None of the
/// methods block or await.
pub trait PubSub: Send + Sync + 'static {
    /// Delivers `message` to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers accepted it. Subscribers with a full
    /// channel are skipped.
    fn publish(&self, topic: &Topic, message: Message) -> usize;

    /// Registers a new subscriber on `topic`.
    fn subscribe(&self, topic: &Topic) -> Subscription;

    /// Detaches a subscription. Calling it twice, or for an unknown
    /// subscription, is a no-op.
    fn unsubscribe(&self, topic: &Topic, subscription: &Subscription);
}

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// Settings for [`MemoryPubSub`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Capacity of each subscriber's channel.
    pub subscriber_capacity: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("subscriber capacity must be greater than zero")]
    ZeroCapacity,
}
