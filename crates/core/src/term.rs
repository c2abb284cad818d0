//! Engine-side term representation
//!
//! [`Term`] is a closed enum covering every shape the engine can hand back
//! across the boundary. Keeping it closed means both codec directions are
//! exhaustive matches: a new term shape fails to compile until every
//! conversion handles it.

use std::mem;

/// An engine-owned payload the bridge never looks inside.
///
/// Dicts and blobs cross the boundary as handles only; the codec collapses
/// them to sentinel symbols on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opaque(u64);

impl Opaque {
    /// Wrap a raw engine handle.
    pub fn from_handle(handle: u64) -> Self {
        Opaque(handle)
    }

    /// The raw engine handle.
    pub fn handle(&self) -> u64 {
        self.0
    }
}

/// A value in the logic engine's representation.
///
/// Lists are chains of [`Term::Pair`] cells terminated by [`Term::Nil`],
/// matching the engine's own cons-cell layout. `Clone`, `PartialEq` and
/// `Drop` are all hand-written with explicit work stacks: a derived
/// implementation would recurse once per list cell.
#[derive(Debug)]
pub enum Term {
    /// An unbound variable.
    Variable,
    /// An atom (interned constant).
    Atom(String),
    /// A string object.
    Str(String),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// The empty list.
    Nil,
    /// A list cell.
    Pair(Box<Term>, Box<Term>),
    /// A compound term: functor name plus arguments.
    Compound(String, Vec<Term>),
    /// A dict, opaque to the bridge.
    Dict(Opaque),
    /// A blob, opaque to the bridge.
    Blob(Opaque),
}

impl Term {
    /// Get the runtime tag name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Term::Variable => "variable",
            Term::Atom(_) => "atom",
            Term::Str(_) => "string",
            Term::Integer(_) => "integer",
            Term::Float(_) => "float",
            Term::Nil => "nil",
            Term::Pair(_, _) => "pair",
            Term::Compound(_, _) => "compound",
            Term::Dict(_) => "dict",
            Term::Blob(_) => "blob",
        }
    }

    /// Build an atom term.
    pub fn atom(name: impl Into<String>) -> Term {
        Term::Atom(name.into())
    }

    /// Build a list cell.
    pub fn pair(head: Term, tail: Term) -> Term {
        Term::Pair(Box::new(head), Box::new(tail))
    }

    /// Build a proper list from the given elements.
    pub fn list(items: impl IntoIterator<Item = Term>) -> Term {
        let items: Vec<Term> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Term::Nil, |tail, head| Term::pair(head, tail))
    }

    /// Collect a proper list into its elements.
    ///
    /// Returns `None` if the term is not a `Nil`-terminated pair chain.
    pub fn as_list(&self) -> Option<Vec<&Term>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Term::Nil => return Some(items),
                Term::Pair(head, tail) => {
                    items.push(head.as_ref());
                    cursor = tail.as_ref();
                }
                _ => return None,
            }
        }
    }
}

impl Clone for Term {
    fn clone(&self) -> Term {
        enum Task<'a> {
            Visit(&'a Term),
            BuildPair,
            BuildCompound { name: &'a str, arity: usize },
        }

        let mut tasks = vec![Task::Visit(self)];
        let mut built: Vec<Term> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(t) => match t {
                    Term::Variable => built.push(Term::Variable),
                    Term::Atom(name) => built.push(Term::Atom(name.clone())),
                    Term::Str(s) => built.push(Term::Str(s.clone())),
                    Term::Integer(i) => built.push(Term::Integer(*i)),
                    Term::Float(f) => built.push(Term::Float(*f)),
                    Term::Nil => built.push(Term::Nil),
                    Term::Dict(o) => built.push(Term::Dict(*o)),
                    Term::Blob(o) => built.push(Term::Blob(*o)),
                    Term::Pair(head, tail) => {
                        tasks.push(Task::BuildPair);
                        tasks.push(Task::Visit(tail.as_ref()));
                        tasks.push(Task::Visit(head.as_ref()));
                    }
                    Term::Compound(name, args) => {
                        tasks.push(Task::BuildCompound {
                            name,
                            arity: args.len(),
                        });
                        for arg in args.iter().rev() {
                            tasks.push(Task::Visit(arg));
                        }
                    }
                },
                Task::BuildPair => {
                    let tail = pop_built(&mut built);
                    let head = pop_built(&mut built);
                    built.push(Term::pair(head, tail));
                }
                Task::BuildCompound { name, arity } => {
                    let args = built.split_off(built.len() - arity);
                    built.push(Term::Compound(name.to_string(), args));
                }
            }
        }
        pop_built(&mut built)
    }
}

fn pop_built(built: &mut Vec<Term>) -> Term {
    // Each Build task is pushed together with exactly the Visit tasks that
    // produce its operands, so the stack cannot underflow here.
    built.pop().expect("clone work stack invariant violated")
}

// Structural equality via an explicit work list, so comparing long lists
// cannot overflow the native stack.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        let mut work = vec![(self, other)];
        while let Some((a, b)) = work.pop() {
            match (a, b) {
                (Term::Variable, Term::Variable) => {}
                (Term::Nil, Term::Nil) => {}
                (Term::Atom(x), Term::Atom(y)) if x == y => {}
                (Term::Str(x), Term::Str(y)) if x == y => {}
                (Term::Integer(x), Term::Integer(y)) if x == y => {}
                (Term::Float(x), Term::Float(y)) if x == y => {}
                (Term::Dict(x), Term::Dict(y)) if x == y => {}
                (Term::Blob(x), Term::Blob(y)) if x == y => {}
                (Term::Pair(head_a, tail_a), Term::Pair(head_b, tail_b)) => {
                    work.push((tail_a.as_ref(), tail_b.as_ref()));
                    work.push((head_a.as_ref(), head_b.as_ref()));
                }
                (Term::Compound(name_a, args_a), Term::Compound(name_b, args_b))
                    if name_a == name_b && args_a.len() == args_b.len() =>
                {
                    work.extend(args_a.iter().zip(args_b.iter()));
                }
                _ => return false,
            }
        }
        true
    }
}

// Same concern on teardown: unlink cells iteratively instead of letting a
// derived drop recurse once per list cell.
impl Drop for Term {
    fn drop(&mut self) {
        let mut stack: Vec<Term> = Vec::new();
        take_children(self, &mut stack);
        while let Some(mut term) = stack.pop() {
            take_children(&mut term, &mut stack);
        }
    }
}

fn take_children(term: &mut Term, stack: &mut Vec<Term>) {
    match term {
        Term::Pair(head, tail) => {
            stack.push(mem::replace(head.as_mut(), Term::Nil));
            stack.push(mem::replace(tail.as_mut(), Term::Nil));
        }
        Term::Compound(_, args) => stack.append(args),
        _ => {}
    }
}
