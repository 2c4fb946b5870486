use std::fmt;
use std::rc::Rc;

use crate::error::EngineError;

/// How a stored [`ExnValue::Closure`] should have its result encoded back into [`wire::Data`]
/// when invoked through `Apply`.
///
/// Grounded in the tension between §4.6's `compile_function`, whose contract always expects a
/// fresh `Data::Object` back (so the result can itself become a `Handle<R>`), and the tuple/
/// list/option converters' disassemble functions, whose callers need the raw structural `Data`
/// (an `Int`, a `List` of `Object`s, …) directly rather than one further indirection through the
/// store. Every stored closure carries the convention its producer intended; the engine loop
/// never has to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyConvention {
    /// Intern the closure's `ExnValue` result and reply with `Data::Object(new_id)`.
    WrapResult,
    /// Encode the closure's `ExnValue` result directly as structural `Data` (no new store entry).
    Structural,
}

/// The engine's universal exception carrier, reified as a concrete Rust enum.
///
/// Every value the engine stores is one of these. Closures are pure: calling one never touches
/// the object store itself, only the inputs and outputs, which is what lets `eval_store` build
/// them without a store handle and the engine loop/Evaluator decide encoding afterwards.
#[derive(Clone)]
pub enum ExnValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
    Pair(Box<ExnValue>, Box<ExnValue>),
    ListV(Vec<ExnValue>),
    OptionV(Option<Box<ExnValue>>),
    Closure(Rc<dyn Fn(ExnValue) -> Result<ExnValue, EngineError>>, ApplyConvention),
}

impl ExnValue {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Unit => "unit",
            Self::Pair(..) => "pair",
            Self::ListV(_) => "list",
            Self::OptionV(_) => "option",
            Self::Closure(..) => "function",
        }
    }

    #[must_use]
    pub fn as_closure(&self) -> Option<(&Rc<dyn Fn(ExnValue) -> Result<ExnValue, EngineError>>, ApplyConvention)> {
        match self {
            Self::Closure(f, conv) => Some((f, *conv)),
            _ => None,
        }
    }
}

impl fmt::Debug for ExnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Str(v) => write!(f, "Str({v:?})"),
            Self::Unit => write!(f, "Unit"),
            Self::Pair(a, b) => write!(f, "Pair({a:?}, {b:?})"),
            Self::ListV(items) => write!(f, "ListV({items:?})"),
            Self::OptionV(v) => write!(f, "OptionV({v:?})"),
            Self::Closure(_, conv) => write!(f, "Closure(<fn>, {conv:?})"),
        }
    }
}
