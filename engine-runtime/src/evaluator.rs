use wire::Data;

use crate::error::EngineError;
use crate::exn::ExnValue;
use crate::store::EngineStore;

/// The seam behind which the engine loop hides "what language the engine evaluates".
///
/// The loop never parses or interprets code itself; it only frames commands, looks up stored
/// values by id, and routes to these three methods. `eval_store`'s result is interned by the
/// loop (not by the evaluator) so that the id-assignment invariant in §4.2 — ids from
/// `StoreExpr` and ids from nested `Object`s in a reply share one counter — lives in exactly one
/// place.
pub trait Evaluator: Send {
    /// Evaluate `code` purely for its side effects. Used for the engine-bootstrap
    /// exception-carrier declarations and for `EvalCode` commands generally.
    fn eval_effect(&mut self, code: &str) -> Result<(), EngineError>;

    /// Evaluate `code` to a value of the universal exception carrier, without touching the
    /// store.
    fn eval_store(&mut self, code: &str) -> Result<ExnValue, EngineError>;

    /// Apply an already-looked-up function value to a decoded `Apply` argument. `store` is
    /// handed through so the evaluator can intern any freshly produced value before describing
    /// it as `Data::Object` in the result.
    fn apply(&mut self, function: &ExnValue, argument: Data, store: &mut EngineStore) -> Result<Data, EngineError>;
}
