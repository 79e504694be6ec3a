//! Error types for the lifecycle harness.

use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for harness operations.
///
/// Each variant carries the context a caller needs to act on the failure.
#[derive(Debug, Error)]
pub enum Error {
    /// `start` was called while a managed process is already owned.
    #[error("Server is already started")]
    AlreadyStarted,

    /// An explicitly configured executable path could not be found or
    /// executed.
    #[error("Unable to find or execute {path}")]
    ExecutableNotFound { path: String },

    /// A bare executable name was not found anywhere on PATH.
    #[error("Unable to find {name} in PATH. Is the managed server installed and your environment activated?")]
    ExecutableNotFoundInPath { name: String },

    /// A retrying call exhausted its attempt budget. Wraps the last
    /// observed transport error or rejected status.
    #[error("Max attempts number reached ({attempts}); {last}")]
    MaxAttemptsExceeded { attempts: u32, last: String },

    /// Invalid input or configuration.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (shouldn't happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates an ExecutableNotFound error.
    pub fn executable_not_found(path: impl Into<String>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }

    /// Creates an ExecutableNotFoundInPath error.
    pub fn executable_not_found_in_path(name: impl Into<String>) -> Self {
        Self::ExecutableNotFoundInPath { name: name.into() }
    }

    /// Creates a MaxAttemptsExceeded error wrapping the last failure.
    pub fn max_attempts_exceeded(attempts: u32, last: impl Into<String>) -> Self {
        Self::MaxAttemptsExceeded {
            attempts,
            last: last.into(),
        }
    }

    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
