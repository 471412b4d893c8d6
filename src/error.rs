//! Error types for singleton locks.
//!
//! Uses thiserror for derive macros. Conflicts are not errors: an `acquire`
//! that finds a live lock resolves to `Ok(false)`. `Conflict` exists only so
//! the CLI can turn that outcome into a non-zero exit code.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The persister's backend failed (connectivity, query, write).
    #[error("{0}")]
    Backend(String),

    /// Filesystem failure from the file backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock name is empty or cannot be stored by the backend.
    #[error("Invalid lock name: {0}")]
    InvalidName(String),

    /// A lock record could not be encoded or decoded.
    #[error("Invalid lock record: {0}")]
    Record(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The command given to `run` could not be started.
    #[error("Failed to run command: {0}")]
    Command(String),

    /// A live lock is held elsewhere (CLI only).
    #[error("{0}")]
    Conflict(String),
}

impl LockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Backend(_) | LockError::Io(_) | LockError::Record(_) => {
                exit_codes::BACKEND_FAILURE
            }
            LockError::InvalidName(_) | LockError::Config(_) | LockError::Command(_) => {
                exit_codes::USER_ERROR
            }
            LockError::Conflict(_) => exit_codes::LOCK_CONFLICT,
        }
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::Record(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        LockError::Backend(format!("SQL error: {}", err))
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
