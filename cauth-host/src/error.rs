//! Host error types.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Process Error
// ============================================================================

/// Error type for subprocess execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Lock Error
// ============================================================================

/// Error type for advisory file locks.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock stayed held past the bounded wait.
    #[error("lock on {path} not acquired within {waited:?}")]
    Timeout {
        /// Lock file path.
        path: PathBuf,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain mirror operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// The keychain CLI rejected the write.
    #[error("failed to update keychain: {0}")]
    WriteFailed(String),

    /// Subprocess failure underneath the keychain CLI.
    #[error("keychain process error: {0}")]
    Process(#[from] ProcessError),
}
