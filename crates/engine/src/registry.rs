//! Predicate-registry engine
//!
//! [`GoalEngine`] is the in-tree [`Engine`] implementation: a registry of
//! arity-2 goal functions keyed by `(module, name)`. A goal takes the
//! caller-supplied input term and returns an iterator of solutions for the
//! output variable; each item is `Ok(term)` for a solution or `Err(term)`
//! for a raised exception. Remaining iterator items are the engine's choice
//! points, so `last` falls out of a peek.
//!
//! Predicates are resolved lazily, like the engine the bridge was built
//! for: opening a query against an unregistered predicate succeeds, and the
//! first pull raises an `existence_error`.

use crate::error::EngineError;
use crate::traits::{Engine, QueryId, Step};
use parking_lot::{Mutex, RwLock};
use plbridge_core::Term;
use std::collections::HashMap;
use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stream of solutions for one goal invocation.
pub type Solutions = Box<dyn Iterator<Item = Result<Term, Term>> + Send>;

type GoalFn = dyn Fn(&Term) -> Solutions + Send + Sync;

struct OpenQuery {
    solutions: Peekable<Solutions>,
    last_solution: Option<Term>,
    raised: bool,
}

/// An [`Engine`] backed by a registry of goal functions.
///
/// Each open query sits behind its own lock so pulling one goal's
/// solutions never stalls another thread's query. The shared table is
/// locked only for the moment of insertion, lookup or removal.
#[derive(Default)]
pub struct GoalEngine {
    initialized: AtomicBool,
    boot_args: Mutex<Vec<String>>,
    predicates: RwLock<HashMap<(String, String), Box<GoalFn>>>,
    queries: Mutex<HashMap<u64, Arc<Mutex<OpenQuery>>>>,
    retained: Mutex<Option<Term>>,
    next_query: AtomicU64,
}

impl GoalEngine {
    /// Create an engine with no predicates registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the built-in predicates registered.
    pub fn with_builtins() -> Self {
        let engine = Self::new();
        engine.register("user", "unify", builtin_unify);
        engine.register("user", "permute", builtin_permute);
        engine.register("user", "raise", builtin_raise);
        engine
    }

    /// Register `module:name/2`, replacing any previous registration.
    pub fn register(
        &self,
        module: impl Into<String>,
        name: impl Into<String>,
        goal: impl Fn(&Term) -> Solutions + Send + Sync + 'static,
    ) {
        self.predicates
            .write()
            .insert((module.into(), name.into()), Box::new(goal));
    }

    /// Bindings retained by the most recent `cut`, if any.
    pub fn retained_solution(&self) -> Option<Term> {
        self.retained.lock().clone()
    }

    /// Arguments recorded by the most recent successful `initialize`.
    pub fn boot_args(&self) -> Vec<String> {
        self.boot_args.lock().clone()
    }
}

impl Engine for GoalEngine {
    fn initialize(&self, args: &[String]) -> bool {
        *self.boot_args.lock() = args.to_vec();
        self.initialized.store(true, Ordering::Release);
        debug!(args = args.len(), "goal engine initialized");
        true
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn open(
        &self,
        context: &str,
        module: &str,
        predicate: &str,
        arg: Term,
    ) -> Result<QueryId, EngineError> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        let solutions: Solutions = {
            let predicates = self.predicates.read();
            match predicates.get(&(module.to_string(), predicate.to_string())) {
                Some(goal) => goal(&arg),
                // Lazy resolution: the error surfaces on the first pull
                None => {
                    let raised = existence_error(module, predicate);
                    Box::new(std::iter::once(Err(raised)))
                }
            }
        };
        let id = self.next_query.fetch_add(1, Ordering::Relaxed) + 1;
        self.queries.lock().insert(
            id,
            Arc::new(Mutex::new(OpenQuery {
                solutions: solutions.peekable(),
                last_solution: None,
                raised: false,
            })),
        );
        debug!(query = id, context, module, predicate, "query opened");
        Ok(QueryId(id))
    }

    fn next(&self, query: QueryId) -> Step {
        // Clone the slot out of the table before pulling: a goal may block
        // arbitrarily long, and other threads' queries must keep moving.
        let slot = match self.queries.lock().get(&query.0) {
            Some(slot) => slot.clone(),
            None => {
                warn!(query = query.0, "next on unknown query id");
                return Step::Exhausted;
            }
        };
        let mut open = slot.lock();
        if open.raised {
            return Step::Exhausted;
        }
        match open.solutions.next() {
            None => Step::Exhausted,
            Some(Err(term)) => {
                open.raised = true;
                Step::Exception(term)
            }
            Some(Ok(term)) => {
                let last = open.solutions.peek().is_none();
                open.last_solution = Some(term.clone());
                Step::Solution { term, last }
            }
        }
    }

    fn cut(&self, query: QueryId) -> Option<Term> {
        match self.queries.lock().remove(&query.0) {
            Some(slot) => {
                let open = slot.lock();
                *self.retained.lock() = open.last_solution.clone();
                None
            }
            None => {
                warn!(query = query.0, "cut on unknown query id");
                None
            }
        }
    }

    fn close(&self, query: QueryId) -> Option<Term> {
        if self.queries.lock().remove(&query.0).is_none() {
            warn!(query = query.0, "close on unknown query id");
        }
        None
    }

    fn cleanup(&self) -> bool {
        self.queries.lock().clear();
        *self.retained.lock() = None;
        self.initialized.store(false, Ordering::Release);
        true
    }
}

/// `unify(X, X)`: exactly one solution equal to the input, no choice point.
fn builtin_unify(arg: &Term) -> Solutions {
    Box::new(std::iter::once(Ok(arg.clone())))
}

/// `permute(List, Perm)`: enumerate permutations, first element varying
/// slowest, matching the engine's depth-first selection order.
fn builtin_permute(arg: &Term) -> Solutions {
    let Some(items) = arg.as_list() else {
        let raised = type_error("list", arg);
        return Box::new(std::iter::once(Err(raised)));
    };
    let items: Vec<Term> = items.into_iter().cloned().collect();
    let perms = permutations(&items);
    Box::new(perms.into_iter().map(|p| Ok(Term::list(p))))
}

/// `raise(Culprit, _)`: raise immediately, carrying the input term.
fn builtin_raise(arg: &Term) -> Solutions {
    let raised = Term::Compound(
        "error".into(),
        vec![
            Term::Compound("bridge_error".into(), vec![arg.clone()]),
            Term::Variable,
        ],
    );
    Box::new(std::iter::once(Err(raised)))
}

fn permutations(items: &[Term]) -> Vec<Vec<Term>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, head) in items.iter().enumerate() {
        let mut rest: Vec<Term> = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

fn existence_error(module: &str, predicate: &str) -> Term {
    Term::Compound(
        "error".into(),
        vec![
            Term::Compound(
                "existence_error".into(),
                vec![
                    Term::atom("procedure"),
                    Term::Compound(
                        "/".into(),
                        vec![
                            Term::atom(format!("{}:{}", module, predicate)),
                            Term::Integer(2),
                        ],
                    ),
                ],
            ),
            Term::Variable,
        ],
    )
}

fn type_error(expected: &str, culprit: &Term) -> Term {
    Term::Compound(
        "error".into(),
        vec![
            Term::Compound(
                "type_error".into(),
                vec![Term::atom(expected), culprit.clone()],
            ),
            Term::Variable,
        ],
    )
}
