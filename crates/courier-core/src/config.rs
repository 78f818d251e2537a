//! Runtime configuration.
//!
//! デフォルト値 + `COURIER_` プレフィックスの環境変数（例: `COURIER_WORKERS=8`）。

use config::{Config, Environment};
use serde::{Deserialize, Serialize};

use crate::pubsub::DEFAULT_INBOX_CAPACITY;
use crate::queue::DEFAULT_QUEUE_CAPACITY;

pub const DEFAULT_WORKERS: usize = 4;

/// Sizes for the queue, the pool and subscriber inboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Number of workers started with the pool.
    pub workers: usize,
    /// Jobs that may wait in the queue before `submit` waits.
    pub queue_capacity: usize,
    /// Default inbox size for new subscriptions.
    pub inbox_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl CourierConfig {
    /// Load from defaults and `COURIER_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("COURIER"))
    }

    /// Load from defaults and the given environment source.
    pub fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cfg = Config::builder()
            .set_default("workers", defaults.workers as i64)?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default("inbox_capacity", defaults.inbox_capacity as i64)?
            .add_source(env.try_parsing(true))
            .build()?;

        let loaded: Self = cfg.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Every size must be at least 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Zero("inbox_capacity"));
        }
        Ok(())
    }
}
