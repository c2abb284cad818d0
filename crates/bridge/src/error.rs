//! Facade error type
//!
//! Everything the host can see goes through here. Marshalling and protocol
//! failures come back as error values; engine exceptions do not — they are
//! decoded terms inside successful responses.

use plbridge_engine::{OpenError, ProtocolError};
use plbridge_session::ServerError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced to the host at the call boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Opening a query failed (protocol, encoding or engine refusal).
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Cursor operation called out of order.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session-server failure.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A session operation was called before `start_top_level_server`.
    #[error("top-level server is not running")]
    ServerNotStarted,
}
