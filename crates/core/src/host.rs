//! Host-side value representation
//!
//! [`HostValue`] mirrors the host application's value universe at the
//! boundary: symbols, strings, integers, and cons cells forming lists.
//! Ownership is entirely the host's; the engine never holds one.

use std::fmt;
use std::mem;

/// A value in the host application's representation.
///
/// `Clone`, `PartialEq` and `Drop` are hand-written with explicit work
/// stacks; derived implementations would recurse once per list cell.
#[derive(Debug)]
pub enum HostValue {
    /// The empty list, also the host's "false".
    Nil,
    /// The host's canonical "true".
    True,
    /// An ordered pair; chains of these form lists.
    Cons(Box<HostValue>, Box<HostValue>),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A string.
    Str(String),
    /// A symbol (interned name).
    Symbol(String),
}

impl HostValue {
    /// Get the runtime tag name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::True => "t",
            HostValue::Cons(_, _) => "cons",
            HostValue::Integer(_) => "integer",
            HostValue::Str(_) => "string",
            HostValue::Symbol(_) => "symbol",
        }
    }

    /// Build a cons cell.
    pub fn cons(car: HostValue, cdr: HostValue) -> HostValue {
        HostValue::Cons(Box::new(car), Box::new(cdr))
    }

    /// Build a symbol.
    pub fn symbol(name: impl Into<String>) -> HostValue {
        HostValue::Symbol(name.into())
    }

    /// Build a proper list from the given elements.
    pub fn list(items: impl IntoIterator<Item = HostValue>) -> HostValue {
        let items: Vec<HostValue> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(HostValue::Nil, |cdr, car| HostValue::cons(car, cdr))
    }
}

impl Clone for HostValue {
    fn clone(&self) -> HostValue {
        enum Task<'a> {
            Visit(&'a HostValue),
            BuildCons,
        }

        let mut tasks = vec![Task::Visit(self)];
        let mut built: Vec<HostValue> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(v) => match v {
                    HostValue::Nil => built.push(HostValue::Nil),
                    HostValue::True => built.push(HostValue::True),
                    HostValue::Integer(i) => built.push(HostValue::Integer(*i)),
                    HostValue::Str(s) => built.push(HostValue::Str(s.clone())),
                    HostValue::Symbol(s) => built.push(HostValue::Symbol(s.clone())),
                    HostValue::Cons(car, cdr) => {
                        tasks.push(Task::BuildCons);
                        tasks.push(Task::Visit(cdr.as_ref()));
                        tasks.push(Task::Visit(car.as_ref()));
                    }
                },
                Task::BuildCons => {
                    let cdr = pop_built(&mut built);
                    let car = pop_built(&mut built);
                    built.push(HostValue::cons(car, cdr));
                }
            }
        }
        pop_built(&mut built)
    }
}

fn pop_built(built: &mut Vec<HostValue>) -> HostValue {
    // Each BuildCons is pushed together with exactly the two Visit tasks
    // that produce its operands, so the stack cannot underflow here.
    built.pop().expect("clone work stack invariant violated")
}

// Printed the way the host prints: `(1 2 3)` for lists, `(a . b)` for a
// dotted pair, strings quoted, symbols bare. Iterative for the same reason
// as the codec: solution lists can be long.
impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Tok<'a> {
            Val(&'a HostValue),
            Tail(&'a HostValue),
            Lit(&'static str),
        }

        let mut stack = vec![Tok::Val(self)];
        while let Some(tok) = stack.pop() {
            match tok {
                Tok::Lit(s) => f.write_str(s)?,
                Tok::Val(v) => match v {
                    HostValue::Nil => f.write_str("nil")?,
                    HostValue::True => f.write_str("t")?,
                    HostValue::Integer(i) => write!(f, "{}", i)?,
                    HostValue::Str(s) => write!(f, "{:?}", s)?,
                    HostValue::Symbol(s) => f.write_str(s)?,
                    HostValue::Cons(car, cdr) => {
                        f.write_str("(")?;
                        stack.push(Tok::Lit(")"));
                        stack.push(Tok::Tail(cdr.as_ref()));
                        stack.push(Tok::Val(car.as_ref()));
                    }
                },
                Tok::Tail(v) => match v {
                    HostValue::Nil => {}
                    HostValue::Cons(car, cdr) => {
                        f.write_str(" ")?;
                        stack.push(Tok::Tail(cdr.as_ref()));
                        stack.push(Tok::Val(car.as_ref()));
                    }
                    other => {
                        f.write_str(" . ")?;
                        stack.push(Tok::Val(other));
                    }
                },
            }
        }
        Ok(())
    }
}

// Structural equality without native recursion: list cells are compared via
// an explicit work list, so comparing long lists cannot overflow the stack.
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        let mut work = vec![(self, other)];
        while let Some((a, b)) = work.pop() {
            match (a, b) {
                (HostValue::Nil, HostValue::Nil) => {}
                (HostValue::True, HostValue::True) => {}
                (HostValue::Integer(x), HostValue::Integer(y)) if x == y => {}
                (HostValue::Str(x), HostValue::Str(y)) if x == y => {}
                (HostValue::Symbol(x), HostValue::Symbol(y)) if x == y => {}
                (HostValue::Cons(car_a, cdr_a), HostValue::Cons(car_b, cdr_b)) => {
                    work.push((cdr_a.as_ref(), cdr_b.as_ref()));
                    work.push((car_a.as_ref(), car_b.as_ref()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for HostValue {}

// Same concern as `Term`: unlink cons chains iteratively on drop.
impl Drop for HostValue {
    fn drop(&mut self) {
        let mut stack: Vec<HostValue> = Vec::new();
        take_children(self, &mut stack);
        while let Some(mut value) = stack.pop() {
            take_children(&mut value, &mut stack);
        }
    }
}

fn take_children(value: &mut HostValue, stack: &mut Vec<HostValue>) {
    if let HostValue::Cons(car, cdr) = value {
        stack.push(mem::replace(car.as_mut(), HostValue::Nil));
        stack.push(mem::replace(cdr.as_mut(), HostValue::Nil));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_tags_are_never_equal() {
        assert_ne!(HostValue::Nil, HostValue::True);
        assert_ne!(HostValue::Str("1".into()), HostValue::Integer(1));
        assert_ne!(HostValue::symbol("x"), HostValue::Str("x".into()));
    }

    #[test]
    fn list_equality_is_structural() {
        let a = HostValue::list([HostValue::Integer(1), HostValue::Integer(2)]);
        let b = HostValue::cons(
            HostValue::Integer(1),
            HostValue::cons(HostValue::Integer(2), HostValue::Nil),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn display_renders_lists_and_dotted_pairs() {
        let list = HostValue::list([
            HostValue::Integer(1),
            HostValue::symbol("x"),
            HostValue::Str("s".into()),
        ]);
        assert_eq!(list.to_string(), "(1 x \"s\")");
        let dotted = HostValue::cons(HostValue::symbol("a"), HostValue::symbol("b"));
        assert_eq!(dotted.to_string(), "(a . b)");
        assert_eq!(HostValue::Nil.to_string(), "nil");
        assert_eq!(HostValue::True.to_string(), "t");
    }

    #[test]
    fn comparing_very_long_lists_does_not_overflow() {
        let make = || {
            let mut v = HostValue::Nil;
            for i in 0..200_000 {
                v = HostValue::cons(HostValue::Integer(i), v);
            }
            v
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn cloning_a_very_long_list_does_not_overflow() {
        let mut v = HostValue::Nil;
        for i in 0..200_000 {
            v = HostValue::cons(HostValue::Integer(i), v);
        }
        let copy = v.clone();
        assert_eq!(copy, v);
    }
}
