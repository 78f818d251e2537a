use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::registry::{Endpoint, TopicRegistry};
use super::subscription::Subscription;
use crate::domain::{SubscriptionId, Topic};
use crate::error::CourierError;
use crate::observability::{BrokerCounters, BrokerCounts};

/// Inbox capacity used when none is configured.
pub const DEFAULT_INBOX_CAPACITY: usize = 1;

/// Result of one [`Broker::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The message was placed in `delivered` inboxes; `pruned` endpoints were
    /// found closed and removed.
    Delivered { delivered: usize, pruned: usize },
    /// The broker is closed; nothing was delivered.
    BrokerClosed,
}

impl PublishOutcome {
    pub fn delivered(&self) -> usize {
        match self {
            PublishOutcome::Delivered { delivered, .. } => *delivered,
            PublishOutcome::BrokerClosed => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PublishOutcome::BrokerClosed)
    }
}

/// In-process publish/subscribe broker.
///
/// - 配送は snapshot 順に一件ずつ。inbox が満杯なら空くまで publish が待つ（back-pressure）
/// - 遅い subscriber が一人いると、後ろの subscriber への配送も遅れる
/// - `Open -> Closed` のみ。close 後の publish は何もしない
pub struct Broker<M> {
    registry: TopicRegistry<M>,
    inbox_capacity: usize,
    closed: AtomicBool,
    counters: BrokerCounters,
}

impl<M> Broker<M> {
    /// `inbox_capacity` of 0 is treated as 1.
    pub fn new(inbox_capacity: usize) -> Self {
        Self {
            registry: TopicRegistry::new(),
            inbox_capacity: inbox_capacity.max(1),
            closed: AtomicBool::new(false),
            counters: BrokerCounters::default(),
        }
    }

    pub fn inbox_capacity(&self) -> usize {
        self.inbox_capacity
    }

    pub fn registry(&self) -> &TopicRegistry<M> {
        &self.registry
    }

    /// Subscribe with the broker's default inbox capacity.
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Result<Subscription<M>, CourierError> {
        self.subscribe_with_capacity(topic, self.inbox_capacity)
    }

    pub fn subscribe_with_capacity(
        &self,
        topic: impl Into<Topic>,
        capacity: usize,
    ) -> Result<Subscription<M>, CourierError> {
        if self.is_closed() {
            return Err(CourierError::BrokerClosed);
        }

        let topic = topic.into();
        let id = SubscriptionId::generate();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.registry.register(&topic, Endpoint::new(id, sender));

        // close と競合した場合: close 側の clear より前に register していれば
        // clear が消す。後なら自分で外す
        if self.is_closed() {
            self.registry.deregister(topic.as_str(), id);
            return Err(CourierError::BrokerClosed);
        }

        debug!(%topic, subscription_id = %id, capacity, "subscribed");
        Ok(Subscription::new(id, topic, receiver))
    }

    /// Stop future deliveries to `subscription`. Messages already in its inbox
    /// stay readable.
    pub fn unsubscribe(&self, subscription: &Subscription<M>) -> bool {
        let removed = self
            .registry
            .deregister(subscription.topic().as_str(), subscription.id());
        if removed {
            debug!(topic = %subscription.topic(), subscription_id = %subscription.id(), "unsubscribed");
        }
        removed
    }

    /// Mark the broker closed and drop every endpoint. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let removed = self.registry.clear();
        info!(endpoints = removed, "broker closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> BrokerCounts {
        self.counters.snapshot()
    }
}

impl<M: Clone + Send> Broker<M> {
    /// Deliver `message` to every current subscriber of `topic`.
    ///
    /// Waits while an inbox is full. After `close` this is a no-op that
    /// returns [`PublishOutcome::BrokerClosed`].
    pub async fn publish(&self, topic: &str, message: M) -> PublishOutcome {
        if self.is_closed() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(topic, "publish on closed broker ignored");
            return PublishOutcome::BrokerClosed;
        }
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let endpoints = self.registry.snapshot(topic);
        let mut delivered = 0;
        let mut gone = Vec::new();
        for endpoint in endpoints.iter() {
            match endpoint.deliver(message.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => gone.push(endpoint.id()),
            }
        }

        let pruned = gone
            .into_iter()
            .filter(|id| self.registry.deregister(topic, *id))
            .count();

        self.counters
            .delivered
            .fetch_add(delivered, Ordering::Relaxed);
        self.counters.pruned.fetch_add(pruned, Ordering::Relaxed);
        trace!(topic, delivered, pruned, "published");

        PublishOutcome::Delivered { delivered, pruned }
    }
}

impl<M> Default for Broker<M> {
    fn default() -> Self {
        Self::new(DEFAULT_INBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let broker = Broker::default();
        let mut sub = broker.subscribe("news").unwrap();

        let outcome = broker.publish("news", "breaking").await;
        assert_eq!(
            outcome,
            PublishOutcome::Delivered {
                delivered: 1,
                pruned: 0
            }
        );
        assert_eq!(sub.recv().await, Some("breaking"));
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_delivers_nothing() {
        let broker: Broker<u8> = Broker::default();
        let outcome = broker.publish("nobody", 1).await;
        assert_eq!(outcome.delivered(), 0);
        assert!(broker.registry().topics().is_empty());
    }

    #[tokio::test]
    async fn full_inbox_blocks_publisher() {
        let broker = Arc::new(Broker::new(1));
        let mut sub = broker.subscribe("x").unwrap();
        broker.publish("x", "m1").await;

        let mut second = tokio::spawn({
            let broker = Arc::clone(&broker);
            async move { broker.publish("x", "m2").await }
        });
        assert!(timeout(SHORT, &mut second).await.is_err());

        assert_eq!(sub.recv().await, Some("m1"));
        let outcome = timeout(Duration::from_secs(1), second).await.unwrap().unwrap();
        assert_eq!(outcome.delivered(), 1);
        assert_eq!(sub.recv().await, Some("m2"));
    }

    #[tokio::test]
    async fn single_publisher_order_is_preserved() {
        let broker = Broker::new(8);
        let mut sub = broker.subscribe("seq").unwrap();
        for n in 0..8 {
            broker.publish("seq", n).await;
        }
        for n in 0..8 {
            assert_eq!(sub.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn unsubscribe_keeps_already_delivered_messages() {
        let broker = Broker::new(2);
        let mut sub = broker.subscribe("t").unwrap();
        broker.publish("t", 1).await;

        assert!(broker.unsubscribe(&sub));
        assert!(!broker.unsubscribe(&sub));
        assert_eq!(broker.publish("t", 2).await.delivered(), 0);

        assert_eq!(sub.recv().await, Some(1));
        // sender が registry から消えたので終端
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let broker = Broker::default();
        let keep = broker.subscribe("t").unwrap();
        let gone = broker.subscribe("t").unwrap();
        drop(gone);

        let outcome = broker.publish("t", "hello").await;
        assert_eq!(
            outcome,
            PublishOutcome::Delivered {
                delivered: 1,
                pruned: 1
            }
        );
        assert_eq!(broker.registry().subscriber_count("t"), 1);
        assert_eq!(broker.counts().pruned, 1);
        drop(keep);
    }

    #[tokio::test]
    async fn dropping_subscriber_unblocks_publisher() {
        let broker = Arc::new(Broker::new(1));
        let sub = broker.subscribe("x").unwrap();
        broker.publish("x", 1).await;

        let blocked = tokio::spawn({
            let broker = Arc::clone(&broker);
            async move { broker.publish("x", 2).await }
        });
        tokio::time::sleep(SHORT).await;
        drop(sub);

        let outcome = timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::Delivered {
                delivered: 0,
                pruned: 1
            }
        );
    }

    #[tokio::test]
    async fn closed_broker_ignores_publish() {
        let broker = Broker::new(4);
        let mut sub = broker.subscribe("t").unwrap();
        broker.publish("t", "before").await;

        broker.close();
        broker.close();
        assert!(broker.is_closed());

        assert_eq!(broker.publish("t", "after").await, PublishOutcome::BrokerClosed);
        assert_eq!(sub.recv().await, Some("before"));
        assert_eq!(sub.recv().await, None);

        let counts = broker.counts();
        assert_eq!(counts.published, 1);
        assert_eq!(counts.dropped, 1);
    }

    #[tokio::test]
    async fn subscribe_after_close_fails() {
        let broker: Broker<u8> = Broker::default();
        broker.close();
        let err = broker.subscribe("t").unwrap_err();
        assert_eq!(err, CourierError::BrokerClosed);
    }

    #[test]
    fn capacity_overrides_are_clamped() {
        let broker: Broker<u8> = Broker::new(0);
        assert_eq!(broker.inbox_capacity(), 1);
        let sub = broker.subscribe_with_capacity("t", 0).unwrap();
        assert_eq!(sub.capacity(), 1);
        let sub = broker.subscribe_with_capacity("t", 16).unwrap();
        assert_eq!(sub.capacity(), 16);
    }
}
