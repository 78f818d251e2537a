//! In-memory bounded job queue.
//!
//! # 実装詳細
//! - `Mutex<VecDeque<Job>>` で FIFO を保持（ロックは await を跨がない）
//! - `Notify` 二本: `jobs_available`（claim 側を起こす）と `space_available`（submit 側を起こす）
//! - `notified()` を先に `enable()` してから状態を見るので、通知の取りこぼしがない

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::domain::Job;
use crate::error::CourierError;

struct JobQueueState<P> {
    ready: VecDeque<Job<P>>,
    closed: bool,
}

/// Bounded FIFO queue shared by producers and workers.
///
/// - `submit` waits while the queue is full and fails with `QueueClosed` once closed.
/// - `claim` hands each job to exactly one caller, in submission order.
/// - After `close`, jobs already enqueued are still claimable; `claim` returns
///   `None` only when the queue is closed *and* drained.
pub struct JobQueue<P> {
    state: Mutex<JobQueueState<P>>,
    capacity: usize,
    jobs_available: Notify,
    space_available: Notify,
}

impl<P> JobQueue<P> {
    /// `capacity` of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(JobQueueState {
                ready: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            jobs_available: Notify::new(),
            space_available: Notify::new(),
        }
    }

    /// Enqueue a job, waiting for free space if the queue is full.
    pub async fn submit(&self, job: Job<P>) -> Result<(), CourierError> {
        loop {
            let space = self.space_available.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(CourierError::QueueClosed);
                }
                if state.ready.len() < self.capacity {
                    let job_id = job.id();
                    state.ready.push_back(job);
                    let depth = state.ready.len();
                    drop(state);

                    self.jobs_available.notify_one();
                    trace!(%job_id, depth, "job enqueued");
                    return Ok(());
                }
            }

            // full: claim 側が一件取るまで待つ
            space.await;
        }
    }

    /// Claim the next job. Waits while the queue is empty and open.
    ///
    /// Cancellation safe: a job is only removed in the same poll that returns it.
    pub async fn claim(&self) -> Option<Job<P>> {
        loop {
            let available = self.jobs_available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(job) = state.ready.pop_front() {
                    drop(state);
                    self.space_available.notify_one();
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }

            available.await;
        }
    }

    /// Stop accepting jobs. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        // 待っている submit / claim を全部起こして closed を見せる
        self.jobs_available.notify_waiters();
        self.space_available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of jobs waiting to be claimed.
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
