//! Server error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised while starting the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address does not parse.
    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddress {
        /// The rejected address.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Binding the listener failed.
    #[error("failed to bind {addr}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the listening socket.
    #[error("listener I/O error")]
    Io(#[from] std::io::Error),
}
