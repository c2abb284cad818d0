//! plbridge - embeddable logic-engine bridge
//!
//! plbridge embeds a logic-programming engine inside a host application
//! behind a narrow call/response boundary: a bidirectional term codec, a
//! per-thread query cursor over the engine's backtracking search, and a
//! supervised thread/session layer for interactive top-level sessions and
//! background goals.
//!
//! # Quick Start
//!
//! ```
//! use plbridge::{Bridge, GoalEngine, HostValue};
//! use std::sync::Arc;
//!
//! let bridge = Bridge::new(Arc::new(GoalEngine::with_builtins()));
//! bridge.initialize_default();
//!
//! let arg = HostValue::list([HostValue::Integer(1), HostValue::Integer(2)]);
//! bridge.open_query("user", "user", "permute", &arg).unwrap();
//! while let Ok(solution) = bridge.next_solution() {
//!     if solution == HostValue::Nil {
//!         break;
//!     }
//!     println!("{}", solution);
//! }
//! bridge.close_query().unwrap();
//! bridge.cleanup();
//! ```
//!
//! # Architecture
//!
//! The host talks to [`Bridge`] only. Values cross the boundary as
//! [`HostValue`]; the engine's side of the same data is [`Term`]. One query
//! may be open per thread at a time; interactive sessions each run on their
//! own supervised worker thread with an independent cursor.

// Re-export the public API from plbridge-bridge and the types it traffics in
pub use plbridge_bridge::*;
pub use plbridge_core::{decode, encode, HostValue, Term};
pub use plbridge_engine::{
    Engine, EngineError, GoalEngine, OpenError, ProtocolError, QueryCursor, Solutions, Step,
};
pub use plbridge_session::{StopHook, Supervisor, TopLevelServer, WorkerId, WorkerKind};
