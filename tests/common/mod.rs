//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main file.

#![allow(dead_code)]

use plbridge::{Bridge, GoalEngine, HostValue, Solutions, Term};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock};

static INIT_TRACING: Once = Once::new();

fn ensure_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init();
    });
}

// Tests that drain or inspect the process-wide supervisor must serialize,
// or one test's cleanup will reap another test's workers.
static SUPERVISOR_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn supervisor_lock() -> MutexGuard<'static, ()> {
    SUPERVISOR_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An initialized bridge over a registry engine with the builtin goals.
pub fn bridge() -> (Bridge, Arc<GoalEngine>) {
    ensure_tracing();
    let engine = Arc::new(GoalEngine::with_builtins());
    let bridge = Bridge::new(engine.clone());
    assert!(bridge.initialize_default());
    (bridge, engine)
}

/// Register `user:block/2` on `engine`: its first pull parks on `rx` until
/// the returned sender side fires. Usable once; later opens yield nothing.
pub fn register_blocking_goal(engine: &GoalEngine, rx: Receiver<()>) {
    let slot = Arc::new(Mutex::new(Some(rx)));
    engine.register("user", "block", move |_arg| {
        let taken = slot.lock().unwrap_or_else(|p| p.into_inner()).take();
        match taken {
            Some(rx) => {
                let solutions: Solutions = Box::new(std::iter::once_with(move || {
                    let _ = rx.recv();
                    Ok(Term::Nil)
                }));
                solutions
            }
            None => Box::new(std::iter::empty()),
        }
    });
}

pub fn int_list(items: &[i64]) -> HostValue {
    HostValue::list(items.iter().map(|i| HostValue::Integer(*i)))
}

/// The `(tag . value)` response shape from `next_solution`.
pub fn tagged(tag: HostValue, value: HostValue) -> HostValue {
    HostValue::cons(tag, value)
}
