//! Error types for guestkit-core.

use crate::HandleId;
use thiserror::Error;

/// Result type alias for guestkit-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during handle operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from guestkit-backend
    #[error("backend error: {0}")]
    Backend(#[from] guestkit_backend::BackendError),

    /// The manager could not allocate a new handle
    #[error("handle allocation failed: {0}")]
    Allocation(String),

    /// Operation on an unknown or already released handle
    #[error("invalid handle: {0}")]
    InvalidHandle(HandleId),
}
