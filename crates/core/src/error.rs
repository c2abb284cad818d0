//! Codec error types
//!
//! Only the host-to-engine direction can fail: the host value universe is
//! larger than what the engine accepts as query arguments. The reverse
//! direction is total — engine shapes the host cannot represent decode to
//! sentinel symbols instead of failing, so partial results stay usable.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, EncodeError>;

/// Failure to represent a host value as an engine term.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The host value's type has no term representation.
    #[error("host value not representable as a term: {0}")]
    Unsupported(&'static str),

    /// A host string buffer violated the framing contract.
    #[error("malformed host string: {0}")]
    MalformedString(String),
}
