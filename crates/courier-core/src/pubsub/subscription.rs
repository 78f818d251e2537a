use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::domain::{SubscriptionId, Topic};

/// The subscriber-owned inbox returned by [`Broker::subscribe`](super::Broker::subscribe).
///
/// Dropping it closes the inbox; the broker prunes the endpoint on the next
/// publish to its topic.
#[derive(Debug)]
pub struct Subscription<M> {
    id: SubscriptionId,
    topic: Topic,
    receiver: mpsc::Receiver<M>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(id: SubscriptionId, topic: Topic, receiver: mpsc::Receiver<M>) -> Self {
        Self {
            id,
            topic,
            receiver,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the endpoint is no longer registered (unsubscribed
    /// or broker closed) and everything already delivered has been read.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is waiting.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Messages waiting in the inbox.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.receiver.max_capacity()
    }
}
