//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connecting to or creating the backing store failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Invalid input (bad path, empty identifier, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
