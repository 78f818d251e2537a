//! Job queue: the bounded, ordered handoff point between producers and workers.

mod memory;

pub use memory::JobQueue;

/// Capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
