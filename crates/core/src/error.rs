//! Core Error Types
//!
//! Defines the foundational error types used across the Agent MRI workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.

use thiserror::Error;

/// Core error type for the Agent MRI workspace.
///
/// `MalformedLog` is the only error the analysis pipeline surfaces to callers;
/// every other anomaly in a run log is downgraded to a data-quality warning.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The raw run log is not a sequence of step records at all
    #[error("Malformed run log: {0}")]
    MalformedLog(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a malformed-log error
    pub fn malformed_log(msg: impl Into<String>) -> Self {
        Self::MalformedLog(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error means the input log was unusable.
    pub fn is_malformed_log(&self) -> bool {
        matches!(self, CoreError::MalformedLog(_))
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
