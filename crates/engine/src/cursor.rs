//! Per-thread query cursor
//!
//! [`QueryCursor`] turns the engine's depth-first, backtracking search into
//! a pull-based protocol: `open`, then `next` until exhaustion, then `cut`
//! (keep bindings) or `close` (discard). At most one cursor may be live on
//! a thread at a time; opening a second is a protocol error, not a silent
//! replace. Distinct threads hold independent cursors.
//!
//! Engine-side query state is released on every exit path: `cut` and
//! `close` consume the cursor, and dropping an unfinalized cursor closes
//! the query as well.

use crate::error::{OpenError, ProtocolError};
use crate::interrupt;
use crate::traits::{Engine, QueryId, Step};
use plbridge_core::{encode, HostValue, Term};
use std::cell::Cell;
use std::sync::Arc;
use tracing::debug;

thread_local! {
    // Liveness flag backing the one-cursor-per-thread invariant.
    static CURSOR_LIVE: Cell<bool> = const { Cell::new(false) };
}

/// A handle on one in-progress, potentially multi-solution query.
pub struct QueryCursor {
    engine: Arc<dyn Engine>,
    id: QueryId,
    open: bool,
}

impl QueryCursor {
    /// Open a query against `module:predicate(arg, Output)` resolved in
    /// `context`, with `arg` translated from the host representation.
    ///
    /// Fails with [`ProtocolError::AlreadyOpen`] if a cursor is already
    /// live on this thread, and with an encode error if `arg` has no term
    /// representation. Does not itself produce a solution.
    pub fn open(
        engine: Arc<dyn Engine>,
        context: &str,
        module: &str,
        predicate: &str,
        arg: &HostValue,
    ) -> Result<QueryCursor, OpenError> {
        if CURSOR_LIVE.with(|live| live.get()) {
            return Err(ProtocolError::AlreadyOpen.into());
        }
        let term = encode(arg)?;
        let id = engine.open(context, module, predicate, term)?;
        CURSOR_LIVE.with(|live| live.set(true));
        debug!(query = id.raw(), module, predicate, "opened query cursor");
        Ok(QueryCursor {
            engine,
            id,
            open: true,
        })
    }

    /// Whether any cursor is live on the calling thread.
    pub fn live_on_this_thread() -> bool {
        CURSOR_LIVE.with(|live| live.get())
    }

    /// Pull the next solution.
    ///
    /// A pending asynchronous interrupt on this thread takes precedence
    /// over the engine and surfaces as [`Step::Exception`].
    pub fn next(&mut self) -> Step {
        if let Some(term) = interrupt::take_pending() {
            debug!(query = self.id.raw(), "interrupt delivered through cursor");
            return Step::Exception(term);
        }
        self.engine.next(self.id)
    }

    /// Finalize the query, retaining the last solution's bindings as far
    /// as the engine allows. Returns the exception term on engine failure.
    pub fn cut(mut self) -> Option<Term> {
        self.finish(true)
    }

    /// Finalize the query, discarding bindings. Returns the exception term
    /// on engine failure.
    pub fn close(mut self) -> Option<Term> {
        self.finish(false)
    }

    fn finish(&mut self, keep_bindings: bool) -> Option<Term> {
        if !self.open {
            return None;
        }
        self.open = false;
        CURSOR_LIVE.with(|live| live.set(false));
        debug!(
            query = self.id.raw(),
            keep_bindings, "finalizing query cursor"
        );
        if keep_bindings {
            self.engine.cut(self.id)
        } else {
            self.engine.close(self.id)
        }
    }
}

impl Drop for QueryCursor {
    fn drop(&mut self) {
        // Guarantees release of engine-side query state even when the
        // caller never reaches cut/close (early return, panic, exception).
        let _ = self.finish(false);
    }
}
