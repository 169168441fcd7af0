//! Single-process bus backed by one bounded channel per subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{Message, PubSub, PubSubConfig, PubSubError, Subscription, SubscriptionId, Topic};

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<Message>,
}

/// The in-memory [`PubSub`] implementation.
///
/// Topics are created on first subscribe and removed when their last
/// subscriber leaves.
pub struct MemoryPubSub {
    topics: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl MemoryPubSub {
    /// Creates a bus with the default subscriber capacity.
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: PubSubConfig::default().subscriber_capacity,
        }
    }

    /// # Errors
    /// Returns [`PubSubError::ZeroCapacity`] if the subscriber capacity is 0.
    pub fn with_config(config: &PubSubConfig) -> Result<Self, PubSubError> {
        if config.subscriber_capacity == 0 {
            return Err(PubSubError::ZeroCapacity);
        }
        Ok(Self {
            capacity: config.subscriber_capacity,
            ..Self::new()
        })
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
    }

    /// Number of topics with at least one registered subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn prune(&self, topic: &Topic) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|s| !s.tx.is_closed());
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl Default for MemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for MemoryPubSub {
    fn publish(&self, topic: &Topic, message: Message) -> usize {
        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            let Some(subs) = topics.get(topic) else {
                tracing::trace!(%topic, "publish with no subscribers");
                return 0;
            };
            for sub in subs {
                match sub.tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(%topic, subscription = sub.id.0, "subscriber queue full, message dropped");
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }
        if saw_closed {
            self.prune(topic);
        }
        delivered
    }

    fn subscribe(&self, topic: &Topic) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, tx });
        tracing::debug!(%topic, subscription = id.0, "subscribed");
        Subscription::new(id, topic.clone(), rx)
    }

    fn unsubscribe(&self, topic: &Topic, subscription: &Subscription) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = topics.get_mut(topic) else {
            return;
        };
        let before = subs.len();
        subs.retain(|s| s.id != subscription.id());
        if subs.len() != before {
            tracing::debug!(%topic, subscription = subscription.id().0, "unsubscribed");
        }
        if subs.is_empty() {
            topics.remove(topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_zero_capacity_is_rejected() {
        let cfg = PubSubConfig {
            subscriber_capacity: 0,
        };
        assert!(matches!(
            MemoryPubSub::with_config(&cfg),
            Err(PubSubError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_subscribe_creates_topic_and_unsubscribe_removes_it() {
        let bus = MemoryPubSub::new();
        let topic = Topic::new("t");
        let sub = bus.subscribe(&topic);
        assert_eq!(bus.subscriber_count(&topic), 1);
        assert_eq!(bus.topic_count(), 1);

        bus.unsubscribe(&topic, &sub);
        assert_eq!(bus.subscriber_count(&topic), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned_on_publish() {
        let bus = MemoryPubSub::new();
        let topic = Topic::new("t");
        let sub = bus.subscribe(&topic);
        drop(sub);

        assert_eq!(bus.publish(&topic, Message::anonymous(&b"x"[..])), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let bus = MemoryPubSub::new();
        let topic = Topic::new("t");
        let a = bus.subscribe(&topic);
        let b = bus.subscribe(&topic);
        assert_ne!(a.id(), b.id());
    }
}
