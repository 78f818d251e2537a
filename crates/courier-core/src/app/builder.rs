//! CourierBuilder - 起動時に一度だけ組み立てるプロセス全体の状態
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - グローバル singleton ではなく、`Arc` ハンドルを明示的に渡す

use std::sync::Arc;

use crate::config::{ConfigError, CourierConfig};
use crate::domain::{Job, Topic};
use crate::error::CourierError;
use crate::observability::{BrokerCounts, PoolCounts};
use crate::pubsub::{Broker, PublishOutcome, Subscription};
use crate::queue::JobQueue;
use crate::runtime::JobHandler;
use crate::worker::WorkerPool;

type HandlerFactory<P, M> = Box<dyn FnOnce(Arc<Broker<M>>) -> Arc<dyn JobHandler<P>> + Send>;

enum HandlerSource<P, M> {
    Ready(Arc<dyn JobHandler<P>>),
    Factory(HandlerFactory<P, M>),
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no job handler was registered")]
    MissingHandler,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Builds a [`Courier`].
///
/// # 使用例
/// ```ignore
/// let courier = CourierBuilder::<u64, String>::new()
///     .config(CourierConfig::load()?)
///     .handler_with(|broker| MyHandler { broker })
///     .build()?;
/// ```
pub struct CourierBuilder<P, M> {
    config: CourierConfig,
    handler: Option<HandlerSource<P, M>>,
}

impl<P, M> CourierBuilder<P, M>
where
    P: Send + 'static,
    M: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            config: CourierConfig::default(),
            handler: None,
        }
    }

    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = config;
        self
    }

    /// Handler を登録
    pub fn handler<H: JobHandler<P> + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(HandlerSource::Ready(Arc::new(handler)));
        self
    }

    /// Register a handler built from the broker the courier will own, so jobs
    /// can publish their results.
    pub fn handler_with<H, F>(mut self, make: F) -> Self
    where
        H: JobHandler<P> + 'static,
        F: FnOnce(Arc<Broker<M>>) -> H + Send + 'static,
    {
        let factory: HandlerFactory<P, M> =
            Box::new(move |broker| Arc::new(make(broker)) as Arc<dyn JobHandler<P>>);
        self.handler = Some(HandlerSource::Factory(factory));
        self
    }

    /// Validate and start the worker pool.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn build(self) -> Result<Courier<P, M>, BuildError> {
        self.config.validate()?;
        let source = self.handler.ok_or(BuildError::MissingHandler)?;

        let queue = Arc::new(JobQueue::new(self.config.queue_capacity));
        let broker = Arc::new(Broker::new(self.config.inbox_capacity));
        let handler = match source {
            HandlerSource::Ready(handler) => handler,
            HandlerSource::Factory(make) => make(Arc::clone(&broker)),
        };
        let pool = WorkerPool::start(self.config.workers, Arc::clone(&queue), handler);

        Ok(Courier {
            config: self.config,
            queue,
            pool,
            broker,
        })
    }
}

impl<P, M> Default for CourierBuilder<P, M>
where
    P: Send + 'static,
    M: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The job-dispatch and topic-notification core, created once at startup.
///
/// Consumers receive explicit handles via [`queue`](Self::queue) and
/// [`broker`](Self::broker).
pub struct Courier<P, M> {
    config: CourierConfig,
    queue: Arc<JobQueue<P>>,
    pool: WorkerPool,
    broker: Arc<Broker<M>>,
}

impl<P, M> Courier<P, M>
where
    P: Send + 'static,
    M: Send + 'static,
{
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<JobQueue<P>> {
        Arc::clone(&self.queue)
    }

    pub fn broker(&self) -> Arc<Broker<M>> {
        Arc::clone(&self.broker)
    }

    pub fn pool_counts(&self) -> PoolCounts {
        self.pool.counts()
    }

    pub fn broker_counts(&self) -> BrokerCounts {
        self.broker.counts()
    }

    pub async fn submit(&self, job: Job<P>) -> Result<(), CourierError> {
        self.queue.submit(job).await
    }

    pub fn subscribe(&self, topic: impl Into<Topic>) -> Result<Subscription<M>, CourierError> {
        self.broker.subscribe(topic)
    }

    /// Close the queue, let workers drain it, then close the broker.
    pub async fn shutdown(self) -> PoolCounts {
        self.queue.close();
        let counts = self.pool.join().await;
        self.broker.close();
        counts
    }

    /// Close the queue and cancel workers between jobs without draining, then
    /// close the broker.
    pub async fn stop(self) -> PoolCounts {
        self.queue.close();
        let counts = self.pool.stop().await;
        self.broker.close();
        counts
    }
}

impl<P, M> Courier<P, M>
where
    P: Send + 'static,
    M: Clone + Send + 'static,
{
    pub async fn publish(&self, topic: &str, message: M) -> PublishOutcome {
        self.broker.publish(topic, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::runtime::handler_fn;
    use async_trait::async_trait;

    struct Doubler {
        broker: Arc<Broker<u64>>,
    }

    #[async_trait]
    impl JobHandler<u64> for Doubler {
        async fn handle(&self, job: Job<u64>) -> Result<(), HandlerError> {
            self.broker.publish("doubled", job.payload() * 2).await;
            Ok(())
        }
    }

    #[test]
    fn build_without_handler_fails() {
        let res = CourierBuilder::<u64, u64>::new().build();
        assert!(matches!(res, Err(BuildError::MissingHandler)));
    }

    #[test]
    fn build_with_zero_workers_fails() {
        let config = CourierConfig {
            workers: 0,
            ..CourierConfig::default()
        };
        let res = CourierBuilder::<u64, u64>::new()
            .config(config)
            .handler(handler_fn(|_job: Job<u64>| async { Ok(()) }))
            .build();
        assert!(matches!(
            res,
            Err(BuildError::InvalidConfig(ConfigError::Zero("workers")))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handlers_report_results_through_the_broker() {
        let config = CourierConfig {
            workers: 2,
            queue_capacity: 4,
            inbox_capacity: 8,
        };
        let courier = CourierBuilder::<u64, u64>::new()
            .config(config)
            .handler_with(|broker| Doubler { broker })
            .build()
            .unwrap();
        let mut results = courier.subscribe("doubled").unwrap();

        for n in 1..=4u64 {
            courier.submit(Job::new(n, n)).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(results.recv().await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![2, 4, 6, 8]);

        let counts = courier.shutdown().await;
        assert_eq!(counts.processed, 4);
        assert_eq!(results.recv().await, None);
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails_on_kept_handle() {
        let courier = CourierBuilder::<(), ()>::new()
            .handler(handler_fn(|_job: Job<()>| async { Ok(()) }))
            .build()
            .unwrap();
        let queue = courier.queue();
        let broker = courier.broker();

        courier.stop().await;
        assert_eq!(
            queue.submit(Job::new(1, ())).await,
            Err(CourierError::QueueClosed)
        );
        assert_eq!(broker.publish("t", ()).await, PublishOutcome::BrokerClosed);
    }
}
