//! Host-facing bridge facade
//!
//! [`Bridge`] is the narrow surface the host calls: initialize the engine,
//! drive one query at a time per thread through the implicit cursor slot,
//! run the top-level session server, signal workers, and clean everything
//! up at shutdown. Responses are host values; engine exceptions travel
//! inside them as decoded terms, never as panics.
//!
//! Solution shapes from [`Bridge::next_solution`]:
//!
//! - `nil` — no more solutions
//! - `(exception . Term)` — the goal raised
//! - `(t . Term)` — a solution, choice points remain
//! - `(! . Term)` — the last solution, no choice points left

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;

pub use config::{BridgeConfig, ConfigError, CONFIG_FILE_NAME};
pub use error::{BridgeError, Result};

use parking_lot::Mutex;
use plbridge_core::{decode, HostValue, Term};
use plbridge_engine::{Engine, ProtocolError, QueryCursor, Step};
use plbridge_session::{Supervisor, TopLevelServer, WorkerId, WorkerKind};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, info, warn};

thread_local! {
    // The implicit "current query" of the calling thread. The cursor value
    // itself enforces single-flight; this slot just gives the zero-argument
    // host calls something to operate on.
    static CURRENT_QUERY: RefCell<Option<QueryCursor>> = const { RefCell::new(None) };
}

/// The bridge between a host application and an embedded logic engine.
pub struct Bridge {
    engine: Arc<dyn Engine>,
    server: Mutex<Option<TopLevelServer>>,
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge over `engine` with default configuration.
    pub fn new(engine: Arc<dyn Engine>) -> Bridge {
        Bridge::with_config(engine, BridgeConfig::default())
    }

    /// Create a bridge over `engine` with the given configuration.
    pub fn with_config(engine: Arc<dyn Engine>, config: BridgeConfig) -> Bridge {
        Bridge {
            engine,
            server: Mutex::new(None),
            config,
        }
    }

    /// The configuration this bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Boot the engine with process-style arguments. Returns success.
    pub fn initialize(&self, args: &[String]) -> bool {
        let ok = self.engine.initialize(args);
        info!(ok, "engine initialization");
        ok
    }

    /// Boot the engine with the configured `engine_args`.
    pub fn initialize_default(&self) -> bool {
        self.initialize(&self.config.engine_args.clone())
    }

    /// Whether the engine has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    /// Open a query on the calling thread's cursor slot.
    ///
    /// `module:predicate` must name an arity-2 predicate; `arg` becomes its
    /// first argument and solutions instantiate the second. Acknowledges
    /// the open; solutions come from [`Bridge::next_solution`].
    pub fn open_query(
        &self,
        context: &str,
        module: &str,
        predicate: &str,
        arg: &HostValue,
    ) -> Result<HostValue> {
        let cursor = QueryCursor::open(self.engine.clone(), context, module, predicate, arg)?;
        CURRENT_QUERY.with(|slot| *slot.borrow_mut() = Some(cursor));
        Ok(HostValue::True)
    }

    /// Pull the next solution of the thread's open query.
    pub fn next_solution(&self) -> Result<HostValue> {
        CURRENT_QUERY.with(|slot| {
            let mut slot = slot.borrow_mut();
            let cursor = slot
                .as_mut()
                .ok_or(BridgeError::Protocol(ProtocolError::NoCurrentQuery))?;
            let response = match cursor.next() {
                Step::Exhausted => HostValue::Nil,
                Step::Exception(term) => {
                    HostValue::cons(HostValue::symbol("exception"), decode(&term))
                }
                Step::Solution { term, last } => {
                    let tag = if last {
                        HostValue::symbol("!")
                    } else {
                        HostValue::True
                    };
                    HostValue::cons(tag, decode(&term))
                }
            };
            Ok(response)
        })
    }

    /// Finalize the thread's open query, retaining its bindings.
    /// Returns `t`, or the decoded exception term on engine failure.
    pub fn cut_query(&self) -> Result<HostValue> {
        self.finalize_current(true)
    }

    /// Finalize the thread's open query, discarding its bindings.
    /// Returns `t`, or the decoded exception term on engine failure.
    pub fn close_query(&self) -> Result<HostValue> {
        self.finalize_current(false)
    }

    fn finalize_current(&self, keep_bindings: bool) -> Result<HostValue> {
        let cursor = CURRENT_QUERY
            .with(|slot| slot.borrow_mut().take())
            .ok_or(BridgeError::Protocol(ProtocolError::NoCurrentQuery))?;
        let raised = if keep_bindings {
            cursor.cut()
        } else {
            cursor.close()
        };
        Ok(match raised {
            None => HostValue::True,
            Some(term) => decode(&term),
        })
    }

    /// Tear down everything this bridge started: the thread's query slot,
    /// the session server, every supervised worker, then the engine.
    pub fn cleanup(&self) -> bool {
        CURRENT_QUERY.with(|slot| slot.borrow_mut().take());
        if let Some(server) = self.server.lock().take() {
            debug!(port = server.port(), "dropping top-level server");
        }
        Supervisor::global().cleanup_all();
        let ok = self.engine.cleanup();
        info!(ok, "bridge cleanup finished");
        ok
    }

    /// Asynchronously raise `goal_text` as an exception on worker `id`.
    pub fn signal_thread(&self, id: WorkerId, goal_text: &str) {
        Supervisor::global().signal(id, Term::atom(goal_text));
    }

    /// Start the top-level session server on `port_hint` (0 falls back to
    /// the configured port, which defaults to ephemeral). Returns the bound
    /// port. Idempotent: a second call returns the running server's port.
    pub fn start_top_level_server(&self, port_hint: u16) -> Result<u16> {
        let mut server = self.server.lock();
        if let Some(running) = server.as_ref() {
            debug!(port = running.port(), "top-level server already running");
            return Ok(running.port());
        }
        let hint = if port_hint == 0 {
            self.config.server_port
        } else {
            port_hint
        };
        let started = TopLevelServer::start(self.engine.clone(), hint)?;
        let port = started.port();
        *server = Some(started);
        Ok(port)
    }

    /// Accept one client for `token`, returning its session worker id.
    pub fn accept_top_level_client(&self, token: &str) -> Result<WorkerId> {
        let server = self.server.lock();
        let server = server.as_ref().ok_or(BridgeError::ServerNotStarted)?;
        Ok(server.request_accept(token)?)
    }

    /// Look up the session worker serving `token`, if still alive.
    pub fn session_worker(&self, token: &str) -> Option<WorkerId> {
        let server = self.server.lock();
        server.as_ref().and_then(|s| s.session_worker(token))
    }

    /// Run `module:predicate(arg, Output)` to exhaustion on a dedicated
    /// background worker. Solutions are logged, not collected; the worker
    /// is interruptible via [`Bridge::signal_thread`].
    pub fn spawn_async_goal(
        &self,
        module: &str,
        predicate: &str,
        arg: HostValue,
    ) -> Result<WorkerId> {
        // Validate the argument here so the failure surfaces to the caller
        // instead of inside the detached worker.
        plbridge_core::encode(&arg).map_err(plbridge_engine::OpenError::from)?;

        let engine = self.engine.clone();
        let module = module.to_string();
        let predicate = predicate.to_string();
        let id = Supervisor::global().spawn(WorkerKind::AsyncGoal, None, move || {
            run_async_goal(engine, &module, &predicate, &arg);
        });
        Ok(id)
    }
}

fn run_async_goal(engine: Arc<dyn Engine>, module: &str, predicate: &str, arg: &HostValue) {
    let mut cursor = match QueryCursor::open(engine, module, module, predicate, arg) {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!(module, predicate, error = %e, "async goal failed to open");
            return;
        }
    };
    loop {
        match cursor.next() {
            Step::Solution { term, last } => {
                debug!(module, predicate, solution = %decode(&term), "async goal solution");
                if last {
                    break;
                }
            }
            Step::Exhausted => break,
            Step::Exception(term) => {
                warn!(module, predicate, exception = %decode(&term), "async goal raised");
                break;
            }
        }
    }
    let _ = cursor.close();
}
