//! Worker-thread supervision and the interactive session server
//!
//! Two components live here:
//!
//! - [`Supervisor`]: a process-wide registry of every worker thread spawned
//!   on behalf of the host, implemented as a message-driven control loop so
//!   concurrent spawn/exit/cleanup requests never race on shared state
//! - [`TopLevelServer`]: a loopback-only listener that turns each accepted
//!   connection into a dedicated read-eval-print session worker
//!
//! All workers — session workers, background goals and the accept loop —
//! register with the supervisor, so [`Supervisor::cleanup_all`] can drain
//! every one of them at host shutdown.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod repl;
pub mod server;
pub mod supervisor;

pub use error::ServerError;
pub use server::TopLevelServer;
pub use supervisor::{StopHook, Supervisor, WorkerId, WorkerKind};
