//! Core error types for cauth.

use thiserror::Error;

/// Core error type for codec and model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credential bytes are not a JSON object.
    #[error("credential blob is not a JSON object")]
    NotAnObject,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
