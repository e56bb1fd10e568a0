//! Error types for guestkit-backend.

use thiserror::Error;

/// Result type alias for guestkit-backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur during backend session operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not reserve resources for a new session
    #[error("session allocation failed: {0}")]
    Allocation(String),

    /// The session was already closed
    #[error("session already closed")]
    AlreadyClosed,

    /// Session is not in the expected state for this operation
    #[error("invalid session state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A drive with this label is already registered on the session
    #[error("duplicate drive label: {0}")]
    DuplicateDrive(String),

    /// The session table lock was poisoned
    #[error("session table lock poisoned")]
    LockPoisoned,
}
