//! Storage handle errors

use thiserror::Error;

/// Result type for storage handle operations
pub type ShardResult<T> = Result<T, ShardError>;

/// Failures raised by a local shard copy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// Engine-level state that must not exist when closing
    #[error("{0}")]
    Inconsistent(String),

    /// Flush could not be made durable
    #[error("{0}")]
    Flush(String),

    /// Shard is closed or failed and cannot serve the request
    #[error("shard {0} is closed")]
    Closed(String),
}
