//! courier-core
//!
//! In-process job dispatch and topic notification.
//!
//! # モジュール構成
//! - **domain**: Job, JobId, Topic, SubscriptionId
//! - **queue**: bounded FIFO job queue
//! - **runtime**: `JobHandler` trait and closure adapter
//! - **worker**: fixed-size worker pool with cooperative stop
//! - **pubsub**: topic registry and publish/subscribe broker
//! - **app**: `Courier` (process-wide state) and its builder
//! - **config / error / observability**: ambient pieces

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod pubsub;
pub mod queue;
pub mod runtime;
pub mod worker;

pub use self::app::{BuildError, Courier, CourierBuilder};
pub use self::config::{ConfigError, CourierConfig};
pub use self::domain::{Job, JobId, SubscriptionId, Topic};
pub use self::error::{CourierError, HandlerError};
pub use self::observability::{BrokerCounts, PoolCounts};
pub use self::pubsub::{Broker, PublishOutcome, Subscription, TopicRegistry};
pub use self::queue::JobQueue;
pub use self::runtime::{JobHandler, handler_fn};
pub use self::worker::WorkerPool;
