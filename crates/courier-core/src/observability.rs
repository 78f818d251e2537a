use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of a worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    /// Jobs whose handler returned `Ok`.
    pub processed: usize,
    /// Jobs whose handler returned `Err` or panicked.
    pub faulted: usize,
    /// Handlers currently executing.
    pub in_flight: usize,
}

impl PoolCounts {
    /// Jobs that have finished, successfully or not.
    pub fn finished(&self) -> usize {
        self.processed + self.faulted
    }
}

/// Point-in-time view of a broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerCounts {
    /// `publish` calls made while open.
    pub published: usize,
    /// Messages placed into an inbox.
    pub delivered: usize,
    /// Endpoints removed because their subscriber went away.
    pub pruned: usize,
    /// `publish` calls ignored because the broker was closed.
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    processed: AtomicUsize,
    faulted: AtomicUsize,
    in_flight: AtomicUsize,
}

impl PoolCounters {
    pub(crate) fn started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts the result before leaving in-flight so `finished()` never lags
    /// behind a handler that already returned.
    pub(crate) fn finished(&self, ok: bool) {
        if ok {
            self.processed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.faulted.fetch_add(1, Ordering::SeqCst);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> PoolCounts {
        PoolCounts {
            processed: self.processed.load(Ordering::SeqCst),
            faulted: self.faulted.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct BrokerCounters {
    pub(crate) published: AtomicUsize,
    pub(crate) delivered: AtomicUsize,
    pub(crate) pruned: AtomicUsize,
    pub(crate) dropped: AtomicUsize,
}

impl BrokerCounters {
    pub(crate) fn snapshot(&self) -> BrokerCounts {
        BrokerCounts {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
