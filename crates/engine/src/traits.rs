//! The engine trait
//!
//! [`Engine`] is the complete surface the bridge needs from a logic engine.
//! Implementations must be callable from any thread; query ids returned by
//! [`Engine::open`] are only ever used from the thread that opened them
//! (the cursor enforces this), but bookkeeping behind the trait must still
//! be thread-safe because independent sessions run concurrent queries.

use crate::error::EngineError;
use plbridge_core::Term;

/// Opaque handle for one in-progress query inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u64);

impl QueryId {
    /// The raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Outcome of pulling one solution from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The goal produced a solution.
    Solution {
        /// The instantiation of the query's output variable.
        term: Term,
        /// True when no alternative choice points remain — the caller may
        /// stop pulling without an explicit cut.
        last: bool,
    },
    /// No more solutions.
    Exhausted,
    /// The goal raised; the exception travels as data.
    Exception(Term),
}

/// The narrow boundary to a logic engine.
///
/// Predicates invoked through [`Engine::open`] are arity 2 by contract:
/// the first argument is supplied by the caller, the second is the implicit
/// output variable whose instantiations come back via [`Engine::next`].
pub trait Engine: Send + Sync {
    /// Boot the engine with process-style arguments. Returns success.
    fn initialize(&self, args: &[String]) -> bool;

    /// Whether [`Engine::initialize`] has succeeded.
    fn is_initialized(&self) -> bool;

    /// Open a query against `module:predicate(arg, Output)` resolved in
    /// `context`. Does not itself produce a solution.
    fn open(
        &self,
        context: &str,
        module: &str,
        predicate: &str,
        arg: Term,
    ) -> Result<QueryId, EngineError>;

    /// Pull the next solution for an open query.
    fn next(&self, query: QueryId) -> Step;

    /// Finalize the query, retaining the last solution's bindings.
    /// Returns the raised exception term when finalization fails.
    fn cut(&self, query: QueryId) -> Option<Term>;

    /// Finalize the query, discarding bindings.
    /// Returns the raised exception term when finalization fails.
    fn close(&self, query: QueryId) -> Option<Term>;

    /// Tear down engine state. Returns success.
    fn cleanup(&self) -> bool;
}
