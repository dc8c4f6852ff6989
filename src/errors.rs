// errors.rs
use thiserror::Error;

/// Errors originating from the snapshot store (SQLite) layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("failed to encode column: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database connection unavailable on this thread")]
    ConnectionUnavailable,
    #[error("blocking store task failed: {0}")]
    Background(String),
}

// Type alias commonly used by store and tracker code.
pub type StoreResult<T> = Result<T, StoreError>;
