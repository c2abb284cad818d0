//! Worker-thread supervisor
//!
//! A single control loop owns the registry of live workers and serializes
//! every lifecycle transition through a typed message channel. No other
//! thread ever touches the registry, so it needs no locks.
//!
//! Worker lifecycle: [`Supervisor::spawn`] starts the thread and blocks
//! until the supervisor has acknowledged its registration; the worker's
//! first action sends `Registered`, and an RAII guard sends `Exited` as its
//! very last — on panic too. Rust offers no way to kill a thread, so
//! "force-terminate" means: raise the worker's interrupt cell, run its stop
//! hook to unblock whatever it is waiting on, then join it.
//!
//! Signalling or joining an already-dead worker is swallowed; the goal of
//! cleanup is "no worker left running", not "every signal landed".

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use plbridge_core::Term;
use plbridge_engine::{interrupt, InterruptCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Identifier for one supervised worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// The raw identifier value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a supervised worker is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// A background goal running to completion.
    AsyncGoal,
    /// An interactive session bound to one connection.
    SessionWorker,
}

/// Hook that unblocks a worker so it can observe its interrupt and exit.
pub type StopHook = Box<dyn FnOnce() + Send>;

enum Control {
    Track {
        id: WorkerId,
        kind: WorkerKind,
        handle: JoinHandle<()>,
        stop: Option<StopHook>,
        interrupt: Arc<InterruptCell>,
        ack: Sender<()>,
    },
    Registered(WorkerId),
    Exited(WorkerId),
    Signal { id: WorkerId, term: Term },
    CleanupAll { done: Sender<()> },
    Roster { reply: Sender<Vec<(WorkerId, WorkerKind)>> },
}

struct TrackedWorker {
    kind: WorkerKind,
    handle: Option<JoinHandle<()>>,
    stop: Option<StopHook>,
    interrupt: Arc<InterruptCell>,
    registered: bool,
    detached: bool,
    ack: Option<Sender<()>>,
}

/// Process-wide worker registry, lazily started on first use and alive for
/// the process lifetime. Cleanup drains its workers, never the loop itself.
pub struct Supervisor {
    control: Mutex<Sender<Control>>,
    next_id: AtomicU64,
}

static SUPERVISOR: Lazy<Supervisor> = Lazy::new(Supervisor::start);

impl Supervisor {
    /// The process-wide supervisor, starting its control loop on first use.
    pub fn global() -> &'static Supervisor {
        &SUPERVISOR
    }

    fn start() -> Supervisor {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("plbridge-supervisor".to_string())
            .spawn(move || control_loop(rx))
            .expect("failed to spawn supervisor control loop");
        info!("supervisor control loop started");
        Supervisor {
            control: Mutex::new(tx),
            next_id: AtomicU64::new(0),
        }
    }

    fn sender(&self) -> Sender<Control> {
        self.control.lock().clone()
    }

    /// Start a supervised worker thread running `work`.
    ///
    /// Blocks until the supervisor has acknowledged the worker's
    /// registration, so the caller can immediately address it (signal it,
    /// look it up in the roster). The worker runs with its interrupt cell
    /// installed; `stop`, when present, must unblock the worker from
    /// whatever it blocks on so cleanup can join it.
    pub fn spawn(
        &self,
        kind: WorkerKind,
        stop: Option<StopHook>,
        work: impl FnOnce() + Send + 'static,
    ) -> WorkerId {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let cell = Arc::new(InterruptCell::new());
        let control = self.sender();
        let (ack_tx, ack_rx) = mpsc::channel();

        let worker_control = control.clone();
        let worker_cell = cell.clone();
        let handle = thread::Builder::new()
            .name(format!("plbridge-worker-{}", id))
            .spawn(move || {
                interrupt::install_current(worker_cell);
                let _exit = ExitGuard {
                    control: worker_control.clone(),
                    id,
                };
                let _ = worker_control.send(Control::Registered(id));
                work();
            })
            .expect("failed to spawn worker thread");

        let _ = control.send(Control::Track {
            id,
            kind,
            handle,
            stop,
            interrupt: cell,
            ack: ack_tx,
        });
        // Registration handshake: the ack arrives once the supervisor has
        // seen both our Track and the worker's Registered.
        let _ = ack_rx.recv();
        id
    }

    /// Asynchronously raise `term` as an exception on worker `id`.
    ///
    /// The target observes it at its next cursor operation or between
    /// interactive turns. Unknown ids are swallowed.
    pub fn signal(&self, id: WorkerId, term: Term) {
        let _ = self.sender().send(Control::Signal { id, term });
    }

    /// Force-terminate and join every tracked worker, blocking until all
    /// are gone. The supervisor keeps running and can spawn again.
    pub fn cleanup_all(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        let _ = self.sender().send(Control::CleanupAll { done: done_tx });
        let _ = done_rx.recv();
    }

    /// Snapshot of currently tracked workers.
    pub fn roster(&self) -> Vec<(WorkerId, WorkerKind)> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let _ = self.sender().send(Control::Roster { reply: reply_tx });
        reply_rx.recv().unwrap_or_default()
    }
}

// Sends Exited as the worker's very last action, panic included.
struct ExitGuard {
    control: Sender<Control>,
    id: WorkerId,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Exited(self.id));
    }
}

fn control_loop(rx: Receiver<Control>) {
    let mut workers: HashMap<WorkerId, TrackedWorker> = HashMap::new();
    // Registered and even Exited can outrun Track: the worker thread starts
    // before the spawner's Track message is sent, and a short-lived worker
    // may be gone by the time Track arrives.
    let mut early_registered: HashSet<WorkerId> = HashSet::new();
    let mut early_exited: HashSet<WorkerId> = HashSet::new();

    while let Ok(msg) = rx.recv() {
        match msg {
            Control::Track {
                id,
                kind,
                handle,
                stop,
                interrupt,
                ack,
            } => {
                if early_exited.remove(&id) {
                    // The worker already ran to completion; never enters the
                    // roster, but the spawner still gets its ack.
                    early_registered.remove(&id);
                    debug!(worker = %id, ?kind, "worker exited before tracking");
                    let _ = ack.send(());
                    let _ = handle.join();
                    continue;
                }
                let registered = early_registered.remove(&id);
                if registered {
                    let _ = ack.send(());
                }
                debug!(worker = %id, ?kind, registered, "tracking worker");
                workers.insert(
                    id,
                    TrackedWorker {
                        kind,
                        handle: Some(handle),
                        stop,
                        interrupt,
                        registered,
                        detached: false,
                        ack: if registered { None } else { Some(ack) },
                    },
                );
            }
            Control::Registered(id) => match workers.get_mut(&id) {
                Some(worker) => {
                    worker.registered = true;
                    if let Some(ack) = worker.ack.take() {
                        let _ = ack.send(());
                    }
                }
                None => {
                    early_registered.insert(id);
                }
            },
            Control::Exited(id) => {
                if let Some(mut worker) = workers.remove(&id) {
                    debug!(worker = %id, "worker exited");
                    // Best-effort join-and-detach; the thread is already on
                    // its way out, so this blocks only momentarily.
                    if !worker.detached {
                        if let Some(handle) = worker.handle.take() {
                            let _ = handle.join();
                        }
                        worker.detached = true;
                    }
                } else {
                    early_exited.insert(id);
                }
            }
            Control::Signal { id, term } => match workers.get(&id) {
                Some(worker) => {
                    debug!(worker = %id, "raising interrupt");
                    worker.interrupt.raise(term);
                }
                None => warn!(worker = %id, "signal for unknown worker dropped"),
            },
            Control::CleanupAll { done } => {
                info!(count = workers.len(), "cleanup: draining all workers");
                for (id, mut worker) in workers.drain() {
                    worker.interrupt.raise(Term::atom("halt"));
                    if let Some(stop) = worker.stop.take() {
                        stop();
                    }
                    if let Some(handle) = worker.handle.take() {
                        if handle.join().is_err() {
                            // Panicked workers count as terminated
                            warn!(worker = %id, "worker panicked before join");
                        }
                    }
                }
                early_registered.clear();
                early_exited.clear();
                let _ = done.send(());
            }
            Control::Roster { reply } => {
                let mut roster: Vec<(WorkerId, WorkerKind)> = workers
                    .iter()
                    .filter(|(_, w)| w.registered)
                    .map(|(id, w)| (*id, w.kind))
                    .collect();
                roster.sort_by_key(|(id, _)| *id);
                let _ = reply.send(roster);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Each test drives its own supervisor instance so that a cleanup in one
    // test cannot drain workers belonging to another running in parallel.
    // Only the `global()` accessor is shared in production.

    #[test]
    fn spawn_registers_and_exit_deregisters() {
        let supervisor = Supervisor::start();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let id = supervisor.spawn(WorkerKind::AsyncGoal, None, move || {
            let _ = release_rx.recv();
        });
        assert!(supervisor.roster().iter().any(|(w, _)| *w == id));
        release_tx.send(()).unwrap();
        // The exit message is asynchronous; poll briefly
        let gone = (0..100).any(|_| {
            if supervisor.roster().iter().all(|(w, _)| *w != id) {
                true
            } else {
                thread::sleep(Duration::from_millis(10));
                false
            }
        });
        assert!(gone, "worker was not deregistered after exiting");
    }

    #[test]
    fn cleanup_joins_blocked_workers() {
        let supervisor = Supervisor::start();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let stop: StopHook = Box::new(move || {
            let _ = release_tx.send(());
        });
        let id = supervisor.spawn(WorkerKind::AsyncGoal, Some(stop), move || {
            // Blocks until the stop hook fires
            let _ = release_rx.recv();
        });
        supervisor.cleanup_all();
        assert!(supervisor.roster().iter().all(|(w, _)| *w != id));
    }

    #[test]
    fn signal_reaches_the_worker_interrupt_cell() {
        let supervisor = Supervisor::start();
        let (seen_tx, seen_rx) = mpsc::channel();
        let id = supervisor.spawn(WorkerKind::AsyncGoal, None, move || loop {
            if let Some(term) = interrupt::take_pending() {
                let _ = seen_tx.send(term);
                return;
            }
            thread::sleep(Duration::from_millis(5));
        });
        supervisor.signal(id, Term::atom("poke"));
        let seen = seen_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never observed the signal");
        assert_eq!(seen, Term::atom("poke"));
    }

    #[test]
    fn roster_is_ordered_by_worker_id() {
        let supervisor = Supervisor::start();
        let mut releases = Vec::new();
        for _ in 0..3 {
            let (release_tx, release_rx) = mpsc::channel::<()>();
            releases.push(release_tx);
            supervisor.spawn(WorkerKind::AsyncGoal, None, move || {
                let _ = release_rx.recv();
            });
        }
        let roster = supervisor.roster();
        assert_eq!(roster.len(), 3);
        assert!(roster.windows(2).all(|pair| pair[0].0 < pair[1].0));
        for release in releases {
            let _ = release.send(());
        }
    }

    #[test]
    fn exit_outrunning_track_leaves_no_ghost_entry() {
        let (tx, rx) = mpsc::channel();
        let loop_handle = thread::spawn(move || control_loop(rx));

        let id = WorkerId(99);
        let worker = thread::spawn(|| {});
        while !worker.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        // Adversarial delivery order: the worker's whole lifetime is
        // observed before its Track message arrives.
        tx.send(Control::Registered(id)).unwrap();
        tx.send(Control::Exited(id)).unwrap();
        let (ack_tx, ack_rx) = mpsc::channel();
        tx.send(Control::Track {
            id,
            kind: WorkerKind::AsyncGoal,
            handle: worker,
            stop: None,
            interrupt: Arc::new(InterruptCell::new()),
            ack: ack_tx,
        })
        .unwrap();
        ack_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("track after exit was not acknowledged");

        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(Control::Roster { reply: reply_tx }).unwrap();
        let roster = reply_rx.recv().unwrap();
        assert!(roster.is_empty(), "ghost entry left behind: {:?}", roster);

        drop(tx);
        loop_handle.join().unwrap();
    }

    #[test]
    fn panicking_worker_still_deregisters() {
        let supervisor = Supervisor::start();
        let id = supervisor.spawn(WorkerKind::AsyncGoal, None, || {
            panic!("worker crash");
        });
        let gone = (0..100).any(|_| {
            if supervisor.roster().iter().all(|(w, _)| *w != id) {
                true
            } else {
                thread::sleep(Duration::from_millis(10));
                false
            }
        });
        assert!(gone, "panicked worker stayed in the roster");
    }
}
