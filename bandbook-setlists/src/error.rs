//! Error types for the setlist builder and service
//!
//! The variants follow how the builder treats each failure:
//! - `Validation`: field-level message, nothing mutated
//! - `InvalidOperation`: no-op, logged as a warning, never blocks the user
//! - `Transport`: search degrades to empty results, submit returns to editing
//! - `ConsistencyViolation`: a broken bucket invariant (a defect)

use thiserror::Error;

/// Result type for the setlists crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected with a message for one form field
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Operation not allowed in the current state (treated as a no-op)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Network or storage boundary failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bucket invariant broken (order gap, duplicate membership)
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error bubbled up from bandbook-common
    #[error(transparent)]
    Common(#[from] bandbook_common::Error),
}

impl Error {
    /// Shorthand for a field-level validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures that happened at the network/storage boundary
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Database(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
