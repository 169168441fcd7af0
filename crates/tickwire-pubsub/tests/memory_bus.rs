//! Integration tests for the in-memory bus: fan-out, ordering, isolation
//! between slow and fast subscribers, and concurrent publishers.

use std::sync::Arc;

use bytes::Bytes;
use tickwire_protocol::SessionId;
use tickwire_pubsub::{MemoryPubSub, Message, PubSub, PubSubConfig, Topic};

fn small_bus(capacity: usize) -> MemoryPubSub {
    MemoryPubSub::with_config(&PubSubConfig {
        subscriber_capacity: capacity,
    })
    .unwrap()
}

// =========================================================================
// Delivery
// =========================================================================

#[tokio::test]
async fn test_publish_reaches_every_subscriber() {
    let bus = MemoryPubSub::new();
    let topic = Topic::new("room:a");
    let mut a = bus.subscribe(&topic);
    let mut b = bus.subscribe(&topic);

    let sender = SessionId::new_random();
    let delivered = bus.publish(&topic, Message::from_session(sender, &b"hello"[..]));
    assert_eq!(delivered, 2);

    for sub in [&mut a, &mut b] {
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.session_id, Some(sender));
        assert_eq!(msg.payload, Bytes::from_static(b"hello"));
    }
}

#[tokio::test]
async fn test_publish_without_subscribers_returns_zero() {
    let bus = MemoryPubSub::new();
    assert_eq!(
        bus.publish(&Topic::new("nobody"), Message::anonymous(&b"x"[..])),
        0
    );
}

#[tokio::test]
async fn test_publish_preserves_order_per_subscriber() {
    let bus = MemoryPubSub::new();
    let topic = Topic::new("ordered");
    let mut sub = bus.subscribe(&topic);

    for i in 0u8..50 {
        bus.publish(&topic, Message::anonymous(vec![i]));
    }
    for i in 0u8..50 {
        assert_eq!(sub.recv().await.unwrap().payload[0], i);
    }
}

#[tokio::test]
async fn test_topics_are_isolated() {
    let bus = MemoryPubSub::new();
    let mut a = bus.subscribe(&Topic::new("a"));
    let _b = bus.subscribe(&Topic::new("b"));

    bus.publish(&Topic::new("b"), Message::anonymous(&b"for b"[..]));
    assert!(a.try_recv().is_none());
}

// =========================================================================
// Backpressure
// =========================================================================

#[tokio::test]
async fn test_slow_subscriber_does_not_starve_fast_one() {
    let bus = small_bus(2);
    let topic = Topic::new("fanout");
    let mut slow = bus.subscribe(&topic);
    let mut fast = bus.subscribe(&topic);

    for i in 0u8..4 {
        bus.publish(&topic, Message::anonymous(vec![i]));
        // fast keeps up
        assert_eq!(fast.recv().await.unwrap().payload[0], i);
    }

    // slow kept only what fit
    assert_eq!(slow.try_recv().unwrap().payload[0], 0);
    assert_eq!(slow.try_recv().unwrap().payload[0], 1);
    assert!(slow.try_recv().is_none());
}

#[tokio::test]
async fn test_publish_counts_only_accepted_deliveries() {
    let bus = small_bus(1);
    let topic = Topic::new("count");
    let _full = bus.subscribe(&topic);
    bus.publish(&topic, Message::anonymous(&b"fill"[..]));

    let _empty = bus.subscribe(&topic);
    assert_eq!(bus.publish(&topic, Message::anonymous(&b"x"[..])), 1);
}

// =========================================================================
// Unsubscribe
// =========================================================================

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let bus = MemoryPubSub::new();
    let topic = Topic::new("t");
    let mut sub = bus.subscribe(&topic);

    bus.unsubscribe(&topic, &sub);
    bus.unsubscribe(&topic, &sub);
    bus.unsubscribe(&Topic::new("other"), &sub);

    assert_eq!(bus.publish(&topic, Message::anonymous(&b"x"[..])), 0);
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn test_unsubscribe_leaves_other_subscribers_attached() {
    let bus = MemoryPubSub::new();
    let topic = Topic::new("t");
    let gone = bus.subscribe(&topic);
    let mut stays = bus.subscribe(&topic);

    bus.unsubscribe(&topic, &gone);
    assert_eq!(bus.publish(&topic, Message::anonymous(&b"x"[..])), 1);
    assert!(stays.recv().await.is_some());
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_deliver_everything() {
    let bus = Arc::new(MemoryPubSub::new());
    let topic = Topic::new("busy");
    let mut sub = bus.subscribe(&topic);

    let mut tasks = Vec::new();
    for p in 0u8..4 {
        let bus = Arc::clone(&bus);
        let topic = topic.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0u8..100 {
                bus.publish(&topic, Message::anonymous(vec![p, i]));
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let mut last_seen = [None::<u8>; 4];
    let mut total = 0;
    while let Some(msg) = sub.try_recv() {
        let (p, i) = (msg.payload[0] as usize, msg.payload[1]);
        // per-publisher order survives interleaving
        if let Some(prev) = last_seen[p] {
            assert!(i > prev);
        }
        last_seen[p] = Some(i);
        total += 1;
    }
    assert_eq!(total, 400);
}
