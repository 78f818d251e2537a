//! Domain model: jobs, topics and identifiers.

pub mod ids;
pub mod job;
pub mod topic;

pub use ids::{JobId, SubscriptionId};
pub use job::Job;
pub use topic::Topic;
