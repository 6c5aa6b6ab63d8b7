use thiserror::Error;

/// Errors that can occur in the queue system.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Queue state lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Other(err.to_string())
    }
}

/// Per-item failure recorded on an item instead of being returned to the caller.
///
/// The `Display` output is what ends up in [`Item::error`](crate::Item::error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// The payload could not be turned into bytes for dispatch.
    #[error("Failed to encode payload: {0}")]
    Encoding(String),

    /// The external transformation reported a failure.
    #[error("{0}")]
    Transformation(String),
}

impl ItemError {
    /// The bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ItemError::Encoding(msg) | ItemError::Transformation(msg) => msg,
        }
    }
}
