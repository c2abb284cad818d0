//! Engine abstraction and query cursor
//!
//! This crate is the seam between the bridge and whichever logic engine is
//! linked in:
//!
//! - [`Engine`]: the narrow trait any engine must implement
//! - [`QueryCursor`]: the per-thread, single-flight cursor over one query
//! - [`GoalEngine`]: an in-tree engine backed by a predicate registry,
//!   used by interactive sessions and the test suites
//! - [`interrupt`]: asynchronous "raise an exception now" delivery
//!
//! The cursor is the only component that touches per-thread query state;
//! two threads may each hold an open cursor without interference.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod error;
pub mod interrupt;
pub mod registry;
pub mod traits;

pub use cursor::QueryCursor;
pub use error::{EngineError, OpenError, ProtocolError};
pub use interrupt::InterruptCell;
pub use registry::{GoalEngine, Solutions};
pub use traits::{Engine, QueryId, Step};
