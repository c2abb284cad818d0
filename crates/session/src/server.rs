//! Top-level session server
//!
//! One loopback listening endpoint, one accept-loop thread, one dedicated
//! worker per accepted connection. Accepts are serialized through an
//! `Accept(token)` message channel: the host's one-session-per-request
//! protocol never needs concurrent accepts, and a single-consumer accept
//! loop keeps the listener free of extra locking. Both the accept loop and
//! every session worker are supervised, so host cleanup drains them all.

use crate::error::{Result, ServerError};
use crate::repl;
use crate::supervisor::{StopHook, Supervisor, WorkerId, WorkerKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use plbridge_engine::Engine;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use tracing::{debug, info, warn};

enum AcceptMsg {
    Accept {
        token: String,
        done: Sender<WorkerId>,
    },
    Shutdown,
}

/// Handle on a running top-level session server.
pub struct TopLevelServer {
    port: u16,
    accept_tx: Mutex<Sender<AcceptMsg>>,
    sessions: Arc<DashMap<String, WorkerId>>,
    accept_worker: WorkerId,
}

impl TopLevelServer {
    /// Bind the loopback listening endpoint (ephemeral port when
    /// `port_hint` is 0) and start the accept-loop thread, blocking until
    /// it is ready to serve accept requests.
    ///
    /// A bind failure is fatal to this call only.
    pub fn start(engine: Arc<dyn Engine>, port_hint: u16) -> Result<TopLevelServer> {
        let listener = TcpListener::bind(("127.0.0.1", port_hint)).map_err(ServerError::Bind)?;
        let port = listener.local_addr().map_err(ServerError::Bind)?.port();

        let (accept_tx, accept_rx) = mpsc::channel::<AcceptMsg>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let sessions: Arc<DashMap<String, WorkerId>> = Arc::new(DashMap::new());

        let stopping = Arc::new(AtomicBool::new(false));
        let stop: StopHook = {
            let stopping = stopping.clone();
            let accept_tx = accept_tx.clone();
            Box::new(move || {
                stopping.store(true, Ordering::Release);
                let _ = accept_tx.send(AcceptMsg::Shutdown);
                // Unblock a pending accept by connecting to ourselves
                let _ = TcpStream::connect(("127.0.0.1", port));
            })
        };

        let loop_sessions = sessions.clone();
        let accept_worker = Supervisor::global().spawn(WorkerKind::SessionWorker, Some(stop), {
            move || {
                let _ = started_tx.send(());
                accept_loop(listener, accept_rx, engine, loop_sessions, stopping);
            }
        });
        // Block until the accept loop is up; the endpoint itself is already
        // bound, so a client may connect as soon as we return.
        let _ = started_rx.recv();
        info!(port, "top-level server started");

        Ok(TopLevelServer {
            port,
            accept_tx: Mutex::new(accept_tx),
            sessions,
            accept_worker,
        })
    }

    /// The bound port number.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The supervised worker id of the accept loop.
    pub fn accept_worker(&self) -> WorkerId {
        self.accept_worker
    }

    /// Ask the accept loop to accept exactly one connection for `token`,
    /// blocking until a session worker is running for it. Synchronous so
    /// the caller can connect its transport client right after requesting.
    pub fn request_accept(&self, token: impl Into<String>) -> Result<WorkerId> {
        let token = token.into();
        let (done_tx, done_rx) = mpsc::channel();
        self.accept_tx
            .lock()
            .send(AcceptMsg::Accept {
                token: token.clone(),
                done: done_tx,
            })
            .map_err(|_| ServerError::Closed)?;
        let worker = done_rx.recv().map_err(|_| ServerError::Closed)?;
        debug!(%token, %worker, "session established");
        Ok(worker)
    }

    /// Look up the session worker serving `token`, if still alive.
    pub fn session_worker(&self, token: &str) -> Option<WorkerId> {
        self.sessions.get(token).map(|entry| *entry.value())
    }
}

fn accept_loop(
    listener: TcpListener,
    accept_rx: mpsc::Receiver<AcceptMsg>,
    engine: Arc<dyn Engine>,
    sessions: Arc<DashMap<String, WorkerId>>,
    stopping: Arc<AtomicBool>,
) {
    while let Ok(msg) = accept_rx.recv() {
        let (token, done) = match msg {
            AcceptMsg::Accept { token, done } => (token, done),
            AcceptMsg::Shutdown => break,
        };
        loop {
            let (stream, peer) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    if stopping.load(Ordering::Acquire) {
                        return;
                    }
                    warn!(error = %e, "accept failed, retrying");
                    continue;
                }
            };
            if stopping.load(Ordering::Acquire) {
                return;
            }
            // Not exposed beyond localhost: close foreign peers outright
            // and keep waiting for a legitimate connection for this token.
            if !peer.ip().is_loopback() {
                warn!(%peer, "rejected non-loopback connection");
                let _ = stream.shutdown(Shutdown::Both);
                continue;
            }

            let worker = spawn_session_worker(&engine, &sessions, &token, stream, peer);
            sessions.insert(token.clone(), worker);
            let _ = done.send(worker);
            break;
        }
    }
    debug!("accept loop terminated");
}

fn spawn_session_worker(
    engine: &Arc<dyn Engine>,
    sessions: &Arc<DashMap<String, WorkerId>>,
    token: &str,
    stream: TcpStream,
    peer: std::net::SocketAddr,
) -> WorkerId {
    let stop: Option<StopHook> = match stream.try_clone() {
        Ok(raw) => Some(Box::new(move || {
            let _ = raw.shutdown(Shutdown::Both);
        })),
        Err(e) => {
            warn!(error = %e, "session stream not cloneable, stop hook omitted");
            None
        }
    };
    let engine = engine.clone();
    let sessions = sessions.clone();
    let token = token.to_string();
    Supervisor::global().spawn(WorkerKind::SessionWorker, stop, move || {
        info!(%token, %peer, "session worker started");
        repl::run_session(engine, stream);
        sessions.remove(&token);
        info!(%token, "session worker finished");
    })
}
