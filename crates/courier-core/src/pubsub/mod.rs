//! Publish/subscribe: topic registry and broker.
//!
//! - `registry`: topic → subscriber endpoint 一覧（read many / write exclusive）
//! - `broker`: subscribe / publish / close
//! - `subscription`: subscriber 側が所有する inbox

pub mod broker;
pub mod registry;
pub mod subscription;

pub use broker::{Broker, DEFAULT_INBOX_CAPACITY, PublishOutcome};
pub use registry::{Endpoint, Snapshot, TopicRegistry};
pub use subscription::Subscription;
