//! TopicRegistry - topic ごとの subscriber endpoint 一覧
//!
//! # 実装詳細
//! - `RwLock<HashMap<Topic, Arc<Vec<Endpoint>>>>`
//! - snapshot は read lock の下で `Arc` を clone するだけ（O(1)）
//! - register / deregister は write lock の下で `Arc::make_mut`（copy-on-write）。
//!   publish 中の snapshot が生きていればその時だけ Vec が複製される

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::domain::{SubscriptionId, Topic};

/// Non-owning delivery handle for one subscriber inbox.
///
/// The subscriber owns the receiving half; dropping it closes the endpoint.
pub struct Endpoint<M> {
    id: SubscriptionId,
    sender: mpsc::Sender<M>,
}

impl<M> Endpoint<M> {
    pub fn new(id: SubscriptionId, sender: mpsc::Sender<M>) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Place `message` in the inbox, waiting while it is full.
    ///
    /// Returns the message back if the subscriber has gone away.
    pub async fn deliver(&self, message: M) -> Result<(), M> {
        self.sender.send(message).await.map_err(|e| e.0)
    }

    /// `true` once the subscriber dropped its receiving half.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// derive だと M: Clone を要求してしまうので手書き
impl<M> Clone for Endpoint<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
        }
    }
}

impl<M> std::fmt::Debug for Endpoint<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Immutable copy of one topic's subscriber list.
pub type Snapshot<M> = Arc<Vec<Endpoint<M>>>;

/// Maps topic names to their subscriber endpoints, in registration order.
pub struct TopicRegistry<M> {
    topics: RwLock<HashMap<Topic, Snapshot<M>>>,
}

impl<M> TopicRegistry<M> {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Append `endpoint` to the topic's list.
    ///
    /// No de-duplication: registering the same endpoint twice yields two
    /// deliveries per publish.
    pub fn register(&self, topic: impl Into<Topic>, endpoint: Endpoint<M>) {
        let mut topics = self.topics.write();
        let list = topics.entry(topic.into()).or_default();
        Arc::make_mut(list).push(endpoint);
    }

    /// Remove the first endpoint with `id` from the topic. Returns whether one
    /// was removed.
    pub fn deregister(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(list) = topics.get_mut(topic) else {
            return false;
        };
        let Some(pos) = list.iter().position(|e| e.id == id) else {
            return false;
        };

        Arc::make_mut(list).remove(pos);
        if list.is_empty() {
            topics.remove(topic);
        }
        true
    }

    /// Current subscriber list for `topic` (empty if nobody subscribed).
    ///
    /// Later register/deregister calls do not affect a snapshot already taken.
    pub fn snapshot(&self, topic: &str) -> Snapshot<M> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, |list| list.len())
    }

    /// Topics with at least one subscriber.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Drop every endpoint. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut topics = self.topics.write();
        let removed = topics.values().map(|list| list.len()).sum();
        topics.clear();
        removed
    }
}

impl<M> Default for TopicRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint<M>(capacity: usize) -> (Endpoint<M>, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Endpoint::new(SubscriptionId::generate(), tx), rx)
    }

    #[test]
    fn register_keeps_insertion_order() {
        let registry = TopicRegistry::<u8>::new();
        let (a, _ra) = endpoint(1);
        let (b, _rb) = endpoint(1);
        registry.register("news", a.clone());
        registry.register("news", b.clone());

        let ids: Vec<_> = registry.snapshot("news").iter().map(Endpoint::id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
        assert_eq!(registry.subscriber_count("news"), 2);
    }

    #[tokio::test]
    async fn duplicate_registration_delivers_twice() {
        let registry = TopicRegistry::<&str>::new();
        let (a, mut rx) = endpoint(4);
        registry.register("x", a.clone());
        registry.register("x", a.clone());

        for ep in registry.snapshot("x").iter() {
            ep.deliver("hi").await.unwrap();
        }
        assert_eq!(rx.recv().await, Some("hi"));
        assert_eq!(rx.recv().await, Some("hi"));

        // 最初の一件だけ外れる
        assert!(registry.deregister("x", a.id()));
        assert_eq!(registry.subscriber_count("x"), 1);
    }

    #[test]
    fn deregister_absent_is_a_no_op() {
        let registry = TopicRegistry::<u8>::new();
        let (a, _ra) = endpoint(1);
        assert!(!registry.deregister("missing", a.id()));

        registry.register("t", a);
        assert!(!registry.deregister("t", SubscriptionId::generate()));
        assert_eq!(registry.subscriber_count("t"), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let registry = TopicRegistry::<u8>::new();
        let (a, _ra) = endpoint(1);
        let (b, _rb) = endpoint(1);
        registry.register("t", a.clone());

        let before = registry.snapshot("t");
        registry.register("t", b);
        registry.deregister("t", a.id());

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].id(), a.id());
        assert_eq!(registry.snapshot("t").len(), 1);
        assert_ne!(registry.snapshot("t")[0].id(), a.id());
    }

    #[test]
    fn empty_topics_disappear() {
        let registry = TopicRegistry::<u8>::new();
        let (a, _ra) = endpoint(1);
        registry.register("t", a.clone());
        assert_eq!(registry.topics(), vec![Topic::from("t")]);

        registry.deregister("t", a.id());
        assert!(registry.topics().is_empty());
        assert!(registry.snapshot("t").is_empty());
    }

    #[test]
    fn clear_reports_removed_endpoints() {
        let registry = TopicRegistry::<u8>::new();
        let (a, _ra) = endpoint(1);
        let (b, _rb) = endpoint(1);
        registry.register("one", a);
        registry.register("two", b);
        assert_eq!(registry.clear(), 2);
        assert!(registry.topics().is_empty());
    }

    #[test]
    fn endpoint_reports_dropped_subscriber() {
        let (a, rx) = endpoint::<u8>(1);
        assert!(!a.is_closed());
        drop(rx);
        assert!(a.is_closed());
    }
}
