//! Engine error types.
//!
//! The messages here are user-visible: the CLI prints them after a
//! `cauth: ` prefix, so each one reads as a complete sentence fragment.

use std::path::PathBuf;
use thiserror::Error;

use cauth_host::{KeychainError, LockError};

/// Error type for rotation operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid invocation; the CLI exits 2 for this kind.
    #[error("usage: {0}")]
    Usage(String),

    /// Neither the credential file nor the keychain holds usable credentials.
    #[error("current credentials not found in file or keychain")]
    NoActiveCredential,

    /// Named profile does not exist.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile exists but has no Claude account bound.
    #[error("profile has no claude account: {0}")]
    ProfileHasNoClaudeAccount(String),

    /// Profile references an account missing from the snapshot.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The account's stored credential file is absent.
    #[error("missing stored credentials: {0}")]
    StoredCredentialMissing(PathBuf),

    /// Token endpoint returned a non-success status.
    #[error("refresh failed ({status}): {body}")]
    RefreshFailed {
        /// HTTP status code.
        status: u16,
        /// First 200 bytes of the response body.
        body: String,
    },

    /// Token endpoint returned 2xx with an unusable body.
    #[error("{0}")]
    RefreshResponseInvalid(String),

    /// The keychain mirror rejected a write.
    #[error("failed to update keychain: {0}")]
    KeychainWriteFailed(String),

    /// A refresh lock stayed contended past the bounded wait.
    #[error("refresh lock timeout: {0}")]
    RefreshLockTimeout(String),

    /// A lock was already held where no wait is attempted.
    #[error("refresh lock unavailable: {0}")]
    RefreshLockUnavailable(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Codec error.
    #[error("credential error: {0}")]
    Core(#[from] cauth_core::CoreError),

    /// Account store error.
    #[error("store error: {0}")]
    Store(#[from] cauth_store::StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeychainError> for EngineError {
    fn from(err: KeychainError) -> Self {
        match err {
            KeychainError::WriteFailed(msg) => EngineError::KeychainWriteFailed(msg),
            KeychainError::Process(e) => EngineError::KeychainWriteFailed(e.to_string()),
        }
    }
}

impl From<LockError> for EngineError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { path, .. } => {
                EngineError::RefreshLockTimeout(path.display().to_string())
            }
            LockError::Io(e) => EngineError::Io(e),
        }
    }
}

impl EngineError {
    /// True for invocation mistakes (CLI exit code 2 instead of 1).
    pub fn is_usage(&self) -> bool {
        matches!(self, EngineError::Usage(_))
    }
}
