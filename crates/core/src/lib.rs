//! Core value types for the engine bridge
//!
//! This crate defines the two value universes that meet at the bridge
//! boundary and the codec that translates between them:
//!
//! - [`Term`]: a value in the logic engine's own representation
//! - [`HostValue`]: a value in the host application's representation
//! - [`codec`]: bidirectional, stack-safe conversion between the two
//!
//! Terms are transient: the engine owns them for the duration of one query
//! and the codec never retains a term past the call that produced it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod host;
pub mod term;

pub use codec::{decode, encode, string_from_host};
pub use error::{EncodeError, Result};
pub use host::HostValue;
pub use term::{Opaque, Term};
