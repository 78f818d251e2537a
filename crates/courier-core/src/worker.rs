use std::any::Any;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::domain::Job;
use crate::error::CourierError;
use crate::observability::{PoolCounters, PoolCounts};
use crate::queue::JobQueue;
use crate::runtime::JobHandler;

/// Fixed-size pool of workers pulling from one [`JobQueue`].
///
/// - `stop()` で全ワーカーに停止シグナルを送り、終了まで待つ
/// - `join()` は queue が close されて空になり、ワーカーが自然に抜けるのを待つ
/// - `WorkerPool` を drop しても停止シグナル扱いになる（sender が消えるため）
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Spawn `n` workers (at least one) on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start<P>(n: usize, queue: Arc<JobQueue<P>>, handler: Arc<dyn JobHandler<P>>) -> Self
    where
        P: Send + 'static,
    {
        let n = n.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(PoolCounters::default());

        let mut joins = Vec::with_capacity(n);
        for id in 0..n {
            let worker = Worker {
                id,
                queue: Arc::clone(&queue),
                handler: Arc::clone(&handler),
                shutdown_rx: shutdown_rx.clone(),
                counters: Arc::clone(&counters),
            };
            joins.push(tokio::spawn(worker.run()));
        }

        info!(workers = n, "worker pool started");
        Self {
            shutdown_tx,
            joins,
            counters,
        }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    pub fn counts(&self) -> PoolCounts {
        self.counters.snapshot()
    }

    /// Raise the cancellation signal without waiting.
    ///
    /// Workers observe it between jobs; a handler that is running finishes first.
    pub fn request_stop(&self) {
        // receiver が全部落ちていても問題ない
        let _ = self.shutdown_tx.send(true);
    }

    /// Raise the cancellation signal and wait for every worker to exit.
    ///
    /// Jobs still in the queue are left there. If a handler never returns,
    /// this never returns either.
    pub async fn stop(self) -> PoolCounts {
        self.request_stop();
        self.join().await
    }

    /// Wait for every worker to exit on its own, i.e. after the queue has been
    /// closed and drained (or after `request_stop`).
    pub async fn join(self) -> PoolCounts {
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }
        let counts = self.counters.snapshot();
        info!(
            processed = counts.processed,
            faulted = counts.faulted,
            "worker pool stopped"
        );
        counts
    }
}

/// One pool slot: `{ id, queue handle, cancellation signal }`.
struct Worker<P> {
    id: usize,
    queue: Arc<JobQueue<P>>,
    handler: Arc<dyn JobHandler<P>>,
    shutdown_rx: watch::Receiver<bool>,
    counters: Arc<PoolCounters>,
}

impl<P: Send + 'static> Worker<P> {
    async fn run(mut self) {
        debug!(worker_id = self.id, "worker started");
        loop {
            // 停止シグナルは job と job の間でだけ見る
            if *self.shutdown_rx.borrow() {
                break;
            }

            // claim は待つ可能性があるので shutdown と競合させる
            let job = tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        // pool が drop された
                        break;
                    }
                    continue;
                }
                job = self.queue.claim() => job,
            };

            let Some(job) = job else {
                debug!(worker_id = self.id, "queue closed and drained");
                break;
            };

            self.execute(job).await;
        }
        debug!(worker_id = self.id, "worker exited");
    }

    /// Run the handler for one job, containing any fault.
    ///
    /// The handler runs as its own task so a panic surfaces as a `JoinError`
    /// instead of unwinding through the worker.
    async fn execute(&self, job: Job<P>) {
        let job_id = job.id();
        trace!(worker_id = self.id, %job_id, waited_ms = job.waited_ms(), "job claimed");

        self.counters.started();
        let handler = Arc::clone(&self.handler);
        let result = tokio::spawn(async move { handler.handle(job).await }).await;

        match result {
            Ok(Ok(())) => {
                self.counters.finished(true);
                trace!(worker_id = self.id, %job_id, "job done");
            }
            Ok(Err(e)) => {
                self.counters.finished(false);
                let fault = CourierError::HandlerFault {
                    job_id,
                    reason: e.to_string(),
                };
                warn!(worker_id = self.id, %job_id, error = %fault, "handler returned an error");
            }
            Err(e) => {
                self.counters.finished(false);
                let reason = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                let fault = CourierError::HandlerFault { job_id, reason };
                error!(worker_id = self.id, %job_id, error = %fault, "handler panicked");
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
