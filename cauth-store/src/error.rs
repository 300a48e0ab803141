//! Store error types.

use thiserror::Error;

/// Error type for account-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store lock error.
    #[error("store lock error: {0}")]
    Lock(#[from] cauth_host::LockError),
}
