//! The compile/apply surface (C6): turning engine-code strings into value and function handles,
//! and applying compiled functions to arguments.

use std::sync::Arc;

use wire::Data;

use crate::converter::Converter;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Func, Handle};
use crate::transport::BridgeTransport;

fn paren(code: &str) -> String {
    format!("({code})")
}

/// Builds a handle to a plain value by submitting `(value_to_exn_A) (engine_code)` (§4.6).
pub async fn compile_value<A: Converter>(transport: &Arc<BridgeTransport>, engine_code: &str) -> BridgeResult<Handle<A>> {
    let composed = format!("{} {}", paren(&A::value_to_exn()), paren(engine_code));
    let id = transport.store_code(&composed).await?;
    Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
}

/// Builds a function handle from `engine_code : D -> R` by composing it with `D`'s projection
/// and `R`'s wrap (§4.6):
/// `fn x => (value_to_exn_R) ((engine_code) ((exn_to_value_D) x))`.
///
/// The composed lambda goes through `eval_store`'s default convention for user lambdas
/// (`WrapResult`), matching `apply`'s expectation that the reply is always a fresh
/// `Data::Object` — exactly what `Handle<Func<D, R>>` needs to exist.
pub async fn compile_function<D: Converter, R: Converter>(
    transport: &Arc<BridgeTransport>,
    engine_code: &str,
) -> BridgeResult<Handle<Func<D, R>>> {
    let composed = format!(
        "fn x => {} ({} ({} x))",
        paren(&R::value_to_exn()),
        paren(engine_code),
        paren(&D::exn_to_value())
    );
    let id = transport.store_code(&composed).await?;
    Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
}

/// Applies a compiled function to an argument handle, awaiting both ids (§4.6). The reply must
/// be `Data::Object`; any other shape is a converter-level protocol error.
pub async fn apply<D, R>(f: &Handle<Func<D, R>>, x: &Handle<D>) -> BridgeResult<Handle<R>>
where
    D: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    let (function_id, argument_id) = futures::try_join!(f.id(), x.id())?;
    let transport = Arc::clone(f.transport());
    let reply = transport.apply(function_id, Data::Object(argument_id)).await?;
    let id = reply
        .as_object()
        .ok_or_else(|| BridgeError::Converter(format!("apply expected an object reply, got a {}", reply.kind_name())))?;
    Ok(unsafe { Handle::from_resolved(transport, id) })
}

/// Assembles a `Data::List` of already-stored element ids into a single tuple object via the
/// matching `__tuple_assemble_N` builtin, returning a handle typed as the tuple itself. Shared by
/// the `applyN` helpers below, which apply a compiled `Func<(D1..Dn), R>>` to `n` separate
/// argument handles by first assembling them into one tuple argument.
async fn assemble_tuple_handle<T: Send + Sync + 'static>(
    transport: &Arc<BridgeTransport>,
    arity: usize,
    element_ids: Vec<wire::ObjectId>,
) -> BridgeResult<Handle<T>> {
    let assemble = transport.builtin_function(&format!("__tuple_assemble_{arity}")).await?;
    let elements = element_ids.into_iter().map(Data::Object).collect();
    let reply = transport.apply(assemble, Data::List(elements)).await?;
    let id = reply
        .as_object()
        .ok_or_else(|| BridgeError::Converter(format!("tuple assemble returned a {}", reply.kind_name())))?;
    Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
}

macro_rules! nary_apply {
    ($name:ident, $arity:literal; $($t:ident : $x:ident),+) => {
        /// n-ary application: assembles the argument handles into one tuple handle and applies
        /// the compiled function to it (§4.6).
        pub async fn $name<$($t,)+ R>(
            f: &Handle<Func<($($t,)+), R>>,
            $($x: &Handle<$t>),+
        ) -> BridgeResult<Handle<R>>
        where
            $($t: Send + Sync + 'static,)+
            R: Send + Sync + 'static,
        {
            let transport = Arc::clone(f.transport());
            let ids = futures::try_join!($($x.id()),+)?;
            let ($($x,)+) = ids;
            let tuple_handle = assemble_tuple_handle(&transport, $arity, vec![$($x),+]).await?;
            apply(f, &tuple_handle).await
        }
    };
}

nary_apply!(apply2, 2; A: a, B: b);
nary_apply!(apply3, 3; A: a, B: b, C: c);
nary_apply!(apply4, 4; A: a, B: b, C: c, D: d);
nary_apply!(apply5, 5; A: a, B: b, C: c, D: d, E: e);
nary_apply!(apply6, 6; A: a, B: b, C: c, D: d, E: e, F: f);
nary_apply!(apply7, 7; A: a, B: b, C: c, D: d, E: e, F: f, G: g);
