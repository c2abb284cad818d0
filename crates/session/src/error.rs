//! Session-server error types

use std::io;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures of the top-level session server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening endpoint could not be bound. Fatal to this start
    /// request only.
    #[error("failed to bind session endpoint: {0}")]
    Bind(#[source] io::Error),

    /// The accept loop is no longer running.
    #[error("session server is shut down")]
    Closed,

    /// Transport-level I/O failure.
    #[error("session transport error: {0}")]
    Io(#[from] io::Error),
}
