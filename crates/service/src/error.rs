//! Error types for the allocation service

use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for service operations.
///
/// Plugin I/O failures never surface here: pool allocation errors are
/// swallowed during allocation (pools are independent) and observation
/// errors go to the caller-supplied exception handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// A required input was missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not permitted in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}
