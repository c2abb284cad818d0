//! Bidirectional term codec
//!
//! Translates between [`HostValue`] and [`Term`] at the bridge boundary.
//! Both directions walk the value with an explicit work stack rather than
//! native recursion, so conversion depth is bounded by heap, not by the
//! thread's stack — long lists are the common case for query results.
//!
//! Decoding is total. Shapes the host cannot represent structurally come
//! back as sentinel symbols:
//!
//! - unbound variables decode to the symbol `variable`
//! - dicts, blobs and floats decode to `dict` / `blob` / `float`
//!
//! The sentinels are a deliberate information-loss boundary kept for
//! compatibility with existing host-side consumers.
//!
//! TODO: structured decoding for floats once the host value universe grows
//! a float tag; dicts and blobs would need an engine-side projection first.

use crate::error::{EncodeError, Result};
use crate::host::HostValue;
use crate::term::Term;

/// Translate a host value into an engine term.
///
/// Only `Nil`, integers, strings and cons chains are representable; any
/// other host tag fails with [`EncodeError::Unsupported`]. The conversion
/// is structural and exact — no coercions.
pub fn encode(value: &HostValue) -> Result<Term> {
    enum Task<'a> {
        Visit(&'a HostValue),
        BuildPair,
    }

    let mut tasks = vec![Task::Visit(value)];
    let mut built: Vec<Term> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(v) => match v {
                HostValue::Nil => built.push(Term::Nil),
                HostValue::Integer(i) => built.push(Term::Integer(*i)),
                HostValue::Str(s) => built.push(Term::Str(s.clone())),
                HostValue::Cons(car, cdr) => {
                    tasks.push(Task::BuildPair);
                    tasks.push(Task::Visit(cdr.as_ref()));
                    tasks.push(Task::Visit(car.as_ref()));
                }
                other => return Err(EncodeError::Unsupported(other.type_name())),
            },
            Task::BuildPair => {
                let tail = pop_built(&mut built);
                let head = pop_built(&mut built);
                built.push(Term::pair(head, tail));
            }
        }
    }

    Ok(pop_built(&mut built))
}

/// Translate an engine term into a host value.
///
/// Total by construction: every term tag has a host rendering, falling back
/// to sentinel symbols where the host has no structural equivalent (see the
/// module docs). Atoms come back as `(atom . "name")`, compounds as
/// `(compound "name" arg...)`.
pub fn decode(term: &Term) -> HostValue {
    enum Task<'a> {
        Visit(&'a Term),
        BuildCons,
        BuildCompound { name: &'a str, arity: usize },
    }

    let mut tasks = vec![Task::Visit(term)];
    let mut built: Vec<HostValue> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(t) => match t {
                Term::Variable => built.push(HostValue::symbol("variable")),
                Term::Atom(name) => built.push(HostValue::cons(
                    HostValue::symbol("atom"),
                    HostValue::Str(name.clone()),
                )),
                Term::Str(s) => built.push(HostValue::Str(s.clone())),
                Term::Integer(i) => built.push(HostValue::Integer(*i)),
                Term::Nil => built.push(HostValue::Nil),
                Term::Pair(head, tail) => {
                    tasks.push(Task::BuildCons);
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
                Term::Dict(_) => built.push(HostValue::symbol("dict")),
                Term::Blob(_) => built.push(HostValue::symbol("blob")),
                Term::Float(_) => built.push(HostValue::symbol("float")),
            },
            Task::BuildCons => {
                let cdr = pop_built(&mut built);
                let car = pop_built(&mut built);
                built.push(HostValue::cons(car, cdr));
            }
            Task::BuildCompound { name, arity } => {
                let mut items = built.split_off(built.len() - arity);
                items.insert(0, HostValue::Str(name.to_string()));
                built.push(HostValue::cons(
                    HostValue::symbol("compound"),
                    HostValue::list(items),
                ));
            }
        }
    }

    pop_built(&mut built)
}

/// Recover a string from a host-framed byte buffer.
///
/// Host strings arrive with one trailing terminator byte; the significant
/// length is the byte length minus one. An empty buffer has no terminator
/// to strip and is rejected rather than underflowing.
pub fn string_from_host(buf: &[u8]) -> Result<String> {
    let Some((_, payload)) = buf.split_last() else {
        return Err(EncodeError::MalformedString(
            "empty buffer has no terminator".into(),
        ));
    };
    match std::str::from_utf8(payload) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => Err(EncodeError::MalformedString(e.to_string())),
    }
}

fn pop_built<T>(built: &mut Vec<T>) -> T {
    // Each Build task is pushed together with exactly the Visit tasks that
    // produce its operands, so the stack cannot underflow here.
    built.pop().expect("codec work stack invariant violated")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int_list(items: &[i64]) -> HostValue {
        HostValue::list(items.iter().map(|i| HostValue::Integer(*i)))
    }

    #[test]
    fn encode_supported_tags() {
        assert_eq!(encode(&HostValue::Nil).unwrap(), Term::Nil);
        assert_eq!(encode(&HostValue::Integer(-7)).unwrap(), Term::Integer(-7));
        assert_eq!(
            encode(&HostValue::Str("abc".into())).unwrap(),
            Term::Str("abc".into())
        );
        assert_eq!(
            encode(&int_list(&[1, 2])).unwrap(),
            Term::list([Term::Integer(1), Term::Integer(2)])
        );
    }

    #[test]
    fn encode_rejects_unsupported_tags() {
        assert_eq!(
            encode(&HostValue::True),
            Err(EncodeError::Unsupported("t"))
        );
        assert_eq!(
            encode(&HostValue::symbol("foo")),
            Err(EncodeError::Unsupported("symbol"))
        );
        // An unsupported value nested inside a list poisons the whole encode
        let nested = HostValue::list([HostValue::Integer(1), HostValue::True]);
        assert_eq!(encode(&nested), Err(EncodeError::Unsupported("t")));
    }

    #[test]
    fn decode_atoms_and_sentinels() {
        assert_eq!(
            decode(&Term::atom("member")),
            HostValue::cons(HostValue::symbol("atom"), HostValue::Str("member".into()))
        );
        assert_eq!(decode(&Term::Variable), HostValue::symbol("variable"));
        assert_eq!(decode(&Term::Float(3.5)), HostValue::symbol("float"));
        assert_eq!(
            decode(&Term::Dict(crate::term::Opaque::from_handle(1))),
            HostValue::symbol("dict")
        );
        assert_eq!(
            decode(&Term::Blob(crate::term::Opaque::from_handle(2))),
            HostValue::symbol("blob")
        );
    }

    #[test]
    fn decode_compound_shape() {
        let t = Term::Compound("error".into(), vec![Term::atom("type"), Term::Integer(2)]);
        assert_eq!(
            decode(&t),
            HostValue::cons(
                HostValue::symbol("compound"),
                HostValue::list([
                    HostValue::Str("error".into()),
                    HostValue::cons(HostValue::symbol("atom"), HostValue::Str("type".into())),
                    HostValue::Integer(2),
                ])
            )
        );
    }

    #[test]
    fn decode_improper_pair_keeps_cell_structure() {
        let t = Term::pair(Term::Integer(1), Term::Integer(2));
        assert_eq!(
            decode(&t),
            HostValue::cons(HostValue::Integer(1), HostValue::Integer(2))
        );
    }

    #[test]
    fn round_trip_on_a_very_long_list_is_stack_safe() {
        let mut v = HostValue::Nil;
        for i in 0..200_000 {
            v = HostValue::cons(HostValue::Integer(i), v);
        }
        let decoded = decode(&encode(&v).unwrap());
        assert_eq!(decoded, v);
    }

    #[test]
    fn string_framing_strips_one_terminator_byte() {
        assert_eq!(string_from_host(b"hello\0").unwrap(), "hello");
        assert_eq!(string_from_host(b"hello\n").unwrap(), "hello");
        assert_eq!(string_from_host(b"\0").unwrap(), "");
        assert!(matches!(
            string_from_host(b""),
            Err(EncodeError::MalformedString(_))
        ));
    }

    // Strategy over the encodable subset of HostValue
    fn encodable() -> impl Strategy<Value = HostValue> {
        let leaf = prop_oneof![
            Just(HostValue::Nil),
            any::<i64>().prop_map(HostValue::Integer),
            "[a-z0-9 ]{0,12}".prop_map(HostValue::Str),
        ];
        leaf.prop_recursive(6, 64, 8, |inner| {
            prop::collection::vec(inner, 0..8).prop_map(HostValue::list)
        })
    }

    proptest! {
        #[test]
        fn round_trip_preserves_encodable_values(v in encodable()) {
            let term = encode(&v).unwrap();
            prop_assert_eq!(decode(&term), v);
        }
    }
}
