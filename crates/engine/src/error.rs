//! Error types for the engine seam
//!
//! Protocol errors are resolved at the call boundary and handed back as
//! values; they are never raised across the host/engine boundary. Engine
//! exceptions are not errors at all here — they travel as decoded terms in
//! [`crate::Step::Exception`].

use plbridge_core::EncodeError;
use thiserror::Error;

/// Cursor operations called out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A cursor is already live on this thread.
    #[error("a query is already open on this thread")]
    AlreadyOpen,

    /// No cursor is live on this thread.
    #[error("no current query on this thread")]
    NoCurrentQuery,
}

/// Failures reported by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine has not been initialized.
    #[error("engine is not initialized")]
    NotInitialized,

    /// The engine rejected the open request.
    #[error("engine rejected the query: {0}")]
    Rejected(String),
}

/// Failure to open a query cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// Out-of-order cursor call (invariant: one live cursor per thread).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The query argument could not be translated to a term.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The engine refused the open.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
