//! Asynchronous interrupt delivery
//!
//! The only cancellation primitive in the bridge: any thread may deposit an
//! exception term into another thread's [`InterruptCell`]; the target's
//! cursor observes it on the next [`crate::QueryCursor::next`] call and
//! surfaces it as [`crate::Step::Exception`].
//!
//! Workers install their cell into thread-local storage on startup so the
//! cursor can consult it without threading the cell through every call.

use parking_lot::Mutex;
use plbridge_core::Term;
use std::cell::RefCell;
use std::sync::Arc;

/// One thread's pending-interrupt slot.
#[derive(Default)]
pub struct InterruptCell {
    pending: Mutex<Option<Term>>,
}

impl InterruptCell {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit an exception term. A later raise replaces an unconsumed one.
    pub fn raise(&self, term: Term) {
        *self.pending.lock() = Some(term);
    }

    /// Consume the pending exception term, if any.
    pub fn take(&self) -> Option<Term> {
        self.pending.lock().take()
    }

    /// Whether an interrupt is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<InterruptCell>>> = const { RefCell::new(None) };
}

/// Install `cell` as the calling thread's interrupt slot.
pub fn install_current(cell: Arc<InterruptCell>) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(cell));
}

/// Remove the calling thread's interrupt slot.
pub fn clear_current() {
    CURRENT.with(|slot| *slot.borrow_mut() = None);
}

/// Consume a pending interrupt on the calling thread, if any.
pub fn take_pending() -> Option<Term> {
    CURRENT.with(|slot| slot.borrow().as_ref().and_then(|cell| cell.take()))
}
