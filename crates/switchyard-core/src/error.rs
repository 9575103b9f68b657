//! Error types for host binding.

use thiserror::Error;

/// Errors raised when a handler collection cannot be mounted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MountError {
    /// The mount path is empty or does not start with `/`.
    #[error("invalid mount path: {0:?}")]
    InvalidPath(String),

    /// The host refuses new mounts (for example after shutdown).
    #[error("host is not accepting mounts: {0}")]
    Unavailable(String),
}
