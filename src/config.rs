use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Maximum number of items a queue holds by default.
pub const MAX_CAPACITY: usize = 10;

/// Maximum number of concurrent transformation calls by default.
pub const BATCH_WIDTH: usize = 2;

/// Configuration for the queue and its scheduler.
///
/// Use [`QueueConfig::builder()`] for ergonomic construction, or
/// [`QueueConfig::default()`] for the stock limits (10 items, 2 at a time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Upper bound on the number of items held by the queue.
    pub max_capacity: usize,

    /// Number of items dispatched together; a group must fully resolve
    /// before the next one starts.
    pub batch_width: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_capacity: MAX_CAPACITY,
            batch_width: BATCH_WIDTH,
        }
    }
}

impl QueueConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Reject limits that would make the queue unusable.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_capacity == 0 {
            return Err(QueueError::InvalidConfig(
                "max_capacity must be at least 1".to_string(),
            ));
        }
        if self.batch_width == 0 {
            return Err(QueueError::InvalidConfig(
                "batch_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`QueueConfig`].
#[derive(Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    /// Set how many items the queue may hold.
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.config.max_capacity = capacity;
        self
    }

    /// Set how many transformation calls may run at once.
    pub fn with_batch_width(mut self, width: usize) -> Self {
        self.config.batch_width = width;
        self
    }

    /// Build the final [`QueueConfig`].
    pub fn build(self) -> QueueConfig {
        self.config
    }
}
