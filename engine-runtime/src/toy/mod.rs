//! A minimal, total reference [`Evaluator`](crate::Evaluator): a toy expression language
//! (`lang`) plus the fixed table of reserved converter-support names (tuple/list/option
//! assemble and disassemble, primitive `assert_*` projections) that this workspace's
//! `enginelink` converters compile against.
//!
//! Not part of the public bridge API; it exists so tests and the `demos` crate can run the
//! protocol end to end without a real theorem-prover process.

mod lang;

use std::rc::Rc;

use wire::Data;

use crate::error::EngineError;
use crate::evaluator::Evaluator;
use crate::exn::{ApplyConvention, ExnValue};
use crate::store::EngineStore;

const MIN_TUPLE_ARITY: usize = 2;
const MAX_TUPLE_ARITY: usize = 7;

#[derive(Debug, Default)]
pub struct ToyEvaluator;

impl ToyEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for ToyEvaluator {
    fn eval_effect(&mut self, code: &str) -> Result<(), EngineError> {
        match code.trim() {
            // The engine-bootstrap declarations (§6) are no-ops here: the toy engine's
            // universal carrier is a fixed Rust enum, not a set of declared ML constructors.
            "declare_exception_carriers" => Ok(()),
            other => lang::eval_top(other).map(|_| ()),
        }
    }

    fn eval_store(&mut self, code: &str) -> Result<ExnValue, EngineError> {
        if let Some(value) = reserved(code.trim()) {
            return Ok(value);
        }
        lang::eval_top(code)
    }

    fn apply(&mut self, function: &ExnValue, argument: Data, store: &mut EngineStore) -> Result<Data, EngineError> {
        let (closure, convention) = function
            .as_closure()
            .ok_or_else(|| EngineError::Shape(format!("cannot apply a {}", function.kind_name())))?;
        let arg = data_to_exn(store, &argument)?;
        let result = closure(arg)?;
        Ok(encode_result(store, result, convention))
    }
}

/// Decodes a wire [`Data`] into an [`ExnValue`], dereferencing `Object` ids through the store.
/// This is how an assemble function receives the element handles a tuple/list converter already
/// stored individually, and how a disassemble/assert function receives the single handle it was
/// invoked on.
fn data_to_exn(store: &EngineStore, data: &Data) -> Result<ExnValue, EngineError> {
    match data {
        Data::Int(v) => Ok(ExnValue::Int(*v)),
        Data::String(s) => Ok(ExnValue::Str(s.clone())),
        Data::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(data_to_exn(store, item)?);
            }
            Ok(ExnValue::ListV(out))
        }
        Data::Object(id) => store.get(*id).cloned(),
    }
}

/// Encodes a closure's result according to its [`ApplyConvention`]. `WrapResult` interns the
/// whole value and returns a single fresh object id; `Structural` inlines scalars directly and
/// interns only the elements of a list/option result, matching what `retrieve()` and the tuple
/// disassemble functions expect back.
fn encode_result(store: &mut EngineStore, value: ExnValue, convention: ApplyConvention) -> Data {
    match convention {
        ApplyConvention::WrapResult => Data::Object(store.insert(value)),
        ApplyConvention::Structural => encode_structural(store, value),
    }
}

fn encode_structural(store: &mut EngineStore, value: ExnValue) -> Data {
    match value {
        ExnValue::Int(v) => Data::Int(v),
        ExnValue::Bool(b) => Data::Int(i64::from(b)),
        ExnValue::Str(s) => Data::String(s),
        ExnValue::Unit => Data::unit(),
        ExnValue::ListV(items) => Data::List(
            items
                .into_iter()
                .map(|item| Data::Object(store.insert(item)))
                .collect(),
        ),
        ExnValue::OptionV(None) => Data::unit(),
        ExnValue::OptionV(Some(inner)) => Data::List(vec![Data::Object(store.insert(*inner))]),
        ExnValue::Pair(a, b) => Data::List(vec![Data::Object(store.insert(*a)), Data::Object(store.insert(*b))]),
        ExnValue::Closure(..) => Data::unit(),
    }
}

fn assert_builtin(expected: &'static str, check: fn(&ExnValue) -> bool) -> ExnValue {
    ExnValue::Closure(
        Rc::new(move |v| {
            if check(&v) {
                Ok(v)
            } else {
                Err(EngineError::Eval(format!("expected a {expected}, found a {}", v.kind_name())))
            }
        }),
        ApplyConvention::Structural,
    )
}

fn tuple_assemble(arity: usize) -> ExnValue {
    ExnValue::Closure(
        Rc::new(move |v| {
            let ExnValue::ListV(items) = v else {
                return Err(EngineError::Shape("tuple assemble expects a list of elements".into()));
            };
            if items.len() != arity {
                return Err(EngineError::Shape(format!(
                    "tuple assemble expected {arity} elements, got {}",
                    items.len()
                )));
            }
            Ok(nest_pairs(items))
        }),
        ApplyConvention::WrapResult,
    )
}

fn tuple_disassemble(arity: usize) -> ExnValue {
    ExnValue::Closure(
        Rc::new(move |v| Ok(ExnValue::ListV(unnest_pairs(v, arity)?))),
        ApplyConvention::Structural,
    )
}

fn nest_pairs(mut items: Vec<ExnValue>) -> ExnValue {
    let last = items.pop().expect("non-empty by construction");
    items
        .into_iter()
        .rev()
        .fold(last, |acc, item| ExnValue::Pair(Box::new(item), Box::new(acc)))
}

fn unnest_pairs(value: ExnValue, arity: usize) -> Result<Vec<ExnValue>, EngineError> {
    let mut out = Vec::with_capacity(arity);
    let mut rest = value;
    for _ in 1..arity {
        match rest {
            ExnValue::Pair(a, b) => {
                out.push(*a);
                rest = *b;
            }
            other => return Err(EngineError::Shape(format!("expected a pair, found a {}", other.kind_name()))),
        }
    }
    out.push(rest);
    Ok(out)
}

fn reserved(name: &str) -> Option<ExnValue> {
    match name {
        "unit" => Some(ExnValue::Unit),
        "assert_int" => Some(assert_builtin("int", |v| matches!(v, ExnValue::Int(_)))),
        "assert_bool" => Some(assert_builtin("bool", |v| matches!(v, ExnValue::Bool(_)))),
        "assert_string" => Some(assert_builtin("string", |v| matches!(v, ExnValue::Str(_)))),
        "assert_unit" => Some(assert_builtin("unit", |v| matches!(v, ExnValue::Unit))),
        "__list_wrap" => Some(ExnValue::Closure(
            Rc::new(|v| {
                let ExnValue::ListV(_) = &v else {
                    return Err(EngineError::Shape("__list_wrap expects a list".into()));
                };
                Ok(v)
            }),
            ApplyConvention::WrapResult,
        )),
        "__list_unwrap" => Some(ExnValue::Closure(
            Rc::new(|v| match v {
                ExnValue::ListV(items) => Ok(ExnValue::ListV(items)),
                other => Err(EngineError::Shape(format!("expected a list, found a {}", other.kind_name()))),
            }),
            ApplyConvention::Structural,
        )),
        "__option_wrap_none" => Some(ExnValue::Closure(
            Rc::new(|_| Ok(ExnValue::OptionV(None))),
            ApplyConvention::WrapResult,
        )),
        "__option_wrap_some" => Some(ExnValue::Closure(
            Rc::new(|v| Ok(ExnValue::OptionV(Some(Box::new(v))))),
            ApplyConvention::WrapResult,
        )),
        "__option_unwrap" => Some(ExnValue::Closure(
            Rc::new(|v| match v {
                ExnValue::OptionV(inner) => Ok(ExnValue::ListV(inner.into_iter().map(|b| *b).collect())),
                other => Err(EngineError::Shape(format!("expected an option, found a {}", other.kind_name()))),
            }),
            ApplyConvention::Structural,
        )),
        _ => parse_tuple_builtin(name),
    }
}

fn parse_tuple_builtin(name: &str) -> Option<ExnValue> {
    if let Some(n) = name.strip_prefix("__tuple_assemble_") {
        let arity: usize = n.parse().ok()?;
        if (MIN_TUPLE_ARITY..=MAX_TUPLE_ARITY).contains(&arity) {
            return Some(tuple_assemble(arity));
        }
    }
    if let Some(n) = name.strip_prefix("__tuple_disassemble_") {
        let arity: usize = n.parse().ok()?;
        if (MIN_TUPLE_ARITY..=MAX_TUPLE_ARITY).contains(&arity) {
            return Some(tuple_disassemble(arity));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_int_passes_matching_value() {
        let mut store = EngineStore::new();
        let mut eval = ToyEvaluator::new();
        let f = eval.eval_store("assert_int").unwrap();
        let reply = eval.apply(&f, Data::Int(42), &mut store).unwrap();
        assert_eq!(reply, Data::Int(42));
    }

    #[test]
    fn assert_int_rejects_mismatched_value() {
        let mut store = EngineStore::new();
        let id = store.insert(ExnValue::Str("nope".into()));
        let mut eval = ToyEvaluator::new();
        let f = eval.eval_store("assert_int").unwrap();
        let err = eval.apply(&f, Data::Object(id), &mut store).unwrap_err();
        assert!(matches!(err, EngineError::Eval(_)));
    }

    #[test]
    fn tuple_assemble_then_disassemble_round_trips() {
        let mut store = EngineStore::new();
        let mut eval = ToyEvaluator::new();

        let a = store.insert(ExnValue::Int(7));
        let b = store.insert(ExnValue::Str("hi".into()));
        let assemble = eval.eval_store("__tuple_assemble_2").unwrap();
        let tuple_data = eval
            .apply(&assemble, Data::List(vec![Data::Object(a), Data::Object(b)]), &mut store)
            .unwrap();
        let tuple_id = tuple_data.as_object().unwrap();

        let disassemble = eval.eval_store("__tuple_disassemble_2").unwrap();
        let parts = eval.apply(&disassemble, Data::Object(tuple_id), &mut store).unwrap();
        let items = parts.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            data_to_exn(&store, &items[0]).unwrap().kind_name(),
            "int"
        );
        assert_eq!(
            data_to_exn(&store, &items[1]).unwrap().kind_name(),
            "string"
        );
    }

    #[test]
    fn compiled_function_squares_and_stringifies() {
        let mut store = EngineStore::new();
        let mut eval = ToyEvaluator::new();
        let f = eval.eval_store("fn i => string_of_int (i * i)").unwrap();
        let reply = eval.apply(&f, Data::Int(123), &mut store).unwrap();
        let id = reply.as_object().unwrap();
        assert!(matches!(store.get(id).unwrap(), ExnValue::Str(s) if s == "15129"));
    }
}
