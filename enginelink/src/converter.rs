//! The converter framework (C5): associates a driver-side type with the engine-side code
//! fragments and store/retrieve logic needed to move values across the bridge.
//!
//! `Handle<A>` itself realises §4.5's "handle converter" without a separate trait impl: storing
//! an already-built handle is just `Clone`, and retrieving one back out is just handing back the
//! same handle — both are exactly `Handle<A>`'s existing inherent operations, so composite
//! converters that want "an element that is already a handle" use `Handle<A>` inline rather than
//! through this trait.

use std::sync::Arc;

use async_trait::async_trait;
use wire::{Data, ObjectId};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::Handle;
use crate::transport::BridgeTransport;

/// Associates `Self` with the engine-side code needed to store and retrieve values of this
/// type. Implementors must be referentially transparent on the engine side: `value_to_exn`/
/// `exn_to_value` name pure functions with no access to mutable engine state (§3).
#[async_trait]
pub trait Converter: Sized + Send + Sync + 'static {
    /// The engine-side type name corresponding to `Self`. Used only for error messages and
    /// code-generation comments.
    fn ml_type() -> String;

    /// An engine expression naming a function that wraps an unwrapped engine value into the
    /// universal exception carrier.
    fn value_to_exn() -> String;

    /// An engine expression naming a function that projects the universal exception carrier
    /// back into the unwrapped type, raising if the projection is ill-typed.
    fn exn_to_value() -> String;

    /// Encodes `value` and returns a handle to it.
    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>>;

    /// Decodes `handle` to a driver-side value.
    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self>;
}

fn not_an_object(context: &str, reply: &Data) -> BridgeError {
    BridgeError::Converter(format!("{context} expected an object, got a {}", reply.kind_name()))
}

#[async_trait]
impl Converter for i64 {
    fn ml_type() -> String {
        "int".to_string()
    }

    fn value_to_exn() -> String {
        "fn x => x".to_string()
    }

    fn exn_to_value() -> String {
        "assert_int".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let id = transport.store_code(&value.to_string()).await?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("assert_int").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        reply.as_int().ok_or_else(|| BridgeError::Converter(format!("assert_int returned a {}", reply.kind_name())))
    }
}

// The source conflates `Int` and `Long` at the driver boundary (§9); `i32` simply narrows on
// retrieve and widens without loss on store.
#[async_trait]
impl Converter for i32 {
    fn ml_type() -> String {
        "int".to_string()
    }

    fn value_to_exn() -> String {
        "fn x => x".to_string()
    }

    fn exn_to_value() -> String {
        "assert_int".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let id = transport.store_code(&value.to_string()).await?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("assert_int").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        let wide = reply.as_int().ok_or_else(|| not_an_object("assert_int", &reply))?;
        Self::try_from(wide).map_err(|_| BridgeError::Converter(format!("{wide} does not fit in an i32")))
    }
}

#[async_trait]
impl Converter for bool {
    fn ml_type() -> String {
        "bool".to_string()
    }

    fn value_to_exn() -> String {
        "fn x => x".to_string()
    }

    fn exn_to_value() -> String {
        "assert_bool".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let code = if value { "true" } else { "false" };
        let id = transport.store_code(code).await?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("assert_bool").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        reply
            .as_int()
            .map(|v| v != 0)
            .ok_or_else(|| BridgeError::Converter(format!("assert_bool returned a {}", reply.kind_name())))
    }
}

#[async_trait]
impl Converter for String {
    fn ml_type() -> String {
        "string".to_string()
    }

    fn value_to_exn() -> String {
        "fn x => x".to_string()
    }

    fn exn_to_value() -> String {
        "assert_string".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let id = transport.store_code(&quote(&value)).await?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("assert_string").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        match reply {
            Data::String(s) => Ok(s),
            other => Err(BridgeError::Converter(format!("assert_string returned a {}", other.kind_name()))),
        }
    }
}

/// Quotes `s` as a string literal the toy expression grammar can lex back.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[async_trait]
impl Converter for () {
    fn ml_type() -> String {
        "unit".to_string()
    }

    fn value_to_exn() -> String {
        "fn x => x".to_string()
    }

    fn exn_to_value() -> String {
        "assert_unit".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, _value: Self) -> BridgeResult<Handle<Self>> {
        let id = transport.store_code("unit").await?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("assert_unit").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        if reply == Data::unit() {
            Ok(())
        } else {
            Err(BridgeError::Converter(format!("assert_unit returned a {}", reply.kind_name())))
        }
    }
}

#[async_trait]
impl<T: Converter> Converter for Vec<T> {
    fn ml_type() -> String {
        format!("{} list", T::ml_type())
    }

    fn value_to_exn() -> String {
        "__list_wrap".to_string()
    }

    fn exn_to_value() -> String {
        "__list_unwrap".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let handles = futures::future::try_join_all(value.into_iter().map(|v| T::store(transport, v))).await?;
        let ids = futures::future::try_join_all(handles.iter().map(Handle::id)).await?;
        let elements: Vec<Data> = ids.into_iter().map(Data::Object).collect();
        let wrap = transport.builtin_function("__list_wrap").await?;
        let reply = transport.apply(wrap, Data::List(elements)).await?;
        let id = reply.as_object().ok_or_else(|| not_an_object("__list_wrap", &reply))?;
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let unwrap = handle.transport().builtin_function("__list_unwrap").await?;
        let reply = handle.transport().apply(unwrap, Data::Object(id)).await?;
        let items = reply
            .as_list()
            .ok_or_else(|| BridgeError::Converter(format!("__list_unwrap returned a {}", reply.kind_name())))?;
        let element_handles = items
            .iter()
            .map(|item| object_handle::<T>(handle.transport(), item))
            .collect::<BridgeResult<Vec<_>>>()?;
        futures::future::try_join_all(element_handles.iter().map(T::retrieve)).await
    }
}

#[async_trait]
impl<T: Converter> Converter for Option<T> {
    fn ml_type() -> String {
        format!("{} option", T::ml_type())
    }

    fn value_to_exn() -> String {
        "__option_wrap_none / __option_wrap_some".to_string()
    }

    fn exn_to_value() -> String {
        "__option_unwrap".to_string()
    }

    async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
        let id = match value {
            None => {
                let f = transport.builtin_function("__option_wrap_none").await?;
                let reply = transport.apply(f, Data::unit()).await?;
                reply.as_object().ok_or_else(|| not_an_object("__option_wrap_none", &reply))?
            }
            Some(inner) => {
                let inner_handle = T::store(transport, inner).await?;
                let inner_id = inner_handle.id().await?;
                let f = transport.builtin_function("__option_wrap_some").await?;
                let reply = transport.apply(f, Data::Object(inner_id)).await?;
                reply.as_object().ok_or_else(|| not_an_object("__option_wrap_some", &reply))?
            }
        };
        Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
    }

    async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
        let id = handle.id().await?;
        let f = handle.transport().builtin_function("__option_unwrap").await?;
        let reply = handle.transport().apply(f, Data::Object(id)).await?;
        let items = reply
            .as_list()
            .ok_or_else(|| BridgeError::Converter(format!("__option_unwrap returned a {}", reply.kind_name())))?;
        match items {
            [] => Ok(None),
            [one] => {
                let inner_handle = object_handle::<T>(handle.transport(), one)?;
                Ok(Some(T::retrieve(&inner_handle).await?))
            }
            _ => Err(BridgeError::Converter(format!(
                "__option_unwrap returned {} elements, expected 0 or 1",
                items.len()
            ))),
        }
    }
}

/// Wraps a `Data` that is expected to be a single `Object` id as a `Handle<T>` pointing at it,
/// without any further wire interaction.
fn object_handle<T>(transport: &Arc<BridgeTransport>, data: &Data) -> BridgeResult<Handle<T>> {
    let id: ObjectId = data.as_object().ok_or_else(|| not_an_object("tuple/list/option element", data))?;
    Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
}

macro_rules! tuple_converter {
    ($arity:literal; $($t:ident : $v:ident),+) => {
        #[async_trait]
        impl<$($t: Converter),+> Converter for ($($t,)+) {
            fn ml_type() -> String {
                let parts: Vec<String> = vec![$($t::ml_type()),+];
                format!("({})", parts.join(" * "))
            }

            fn value_to_exn() -> String {
                format!("__tuple_assemble_{}", $arity)
            }

            fn exn_to_value() -> String {
                format!("__tuple_disassemble_{}", $arity)
            }

            async fn store(transport: &Arc<BridgeTransport>, value: Self) -> BridgeResult<Handle<Self>> {
                let ($($v,)+) = value;
                let ($($v,)+) = futures::try_join!($($t::store(transport, $v)),+)?;
                let ids = futures::try_join!($($v.id()),+)?;
                let ($($v,)+) = ids;
                let elements = vec![$(Data::Object($v)),+];
                let assemble = transport.builtin_function(&format!("__tuple_assemble_{}", $arity)).await?;
                let reply = transport.apply(assemble, Data::List(elements)).await?;
                let id = reply.as_object().ok_or_else(|| not_an_object("tuple assemble", &reply))?;
                Ok(unsafe { Handle::from_resolved(Arc::clone(transport), id) })
            }

            async fn retrieve(handle: &Handle<Self>) -> BridgeResult<Self> {
                let id = handle.id().await?;
                let disassemble = handle.transport().builtin_function(&format!("__tuple_disassemble_{}", $arity)).await?;
                let reply = handle.transport().apply(disassemble, Data::Object(id)).await?;
                let items = reply
                    .as_list()
                    .ok_or_else(|| BridgeError::Converter(format!("tuple disassemble returned a {}", reply.kind_name())))?;
                if items.len() != $arity {
                    return Err(BridgeError::Converter(format!(
                        "tuple disassemble returned {} elements, expected {}",
                        items.len(),
                        $arity
                    )));
                }
                let mut iter = items.iter();
                $(
                    let $v = object_handle::<$t>(handle.transport(), iter.next().expect("length checked above"))?;
                )+
                let values = futures::try_join!($($t::retrieve(&$v)),+)?;
                Ok(values)
            }
        }
    };
}

tuple_converter!(2; A: a, B: b);
tuple_converter!(3; A: a, B: b, C: c);
tuple_converter!(4; A: a, B: b, C: c, D: d);
tuple_converter!(5; A: a, B: b, C: c, D: d, E: e);
tuple_converter!(6; A: a, B: b, C: c, D: d, E: e, F: f);
tuple_converter!(7; A: a, B: b, C: c, D: d, E: e, F: f, G: g);
