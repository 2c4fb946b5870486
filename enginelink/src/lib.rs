//! The driver-side half of the bridge: a connection to an external engine process presented as
//! typed, composable async handles.
//!
//! [`BridgeTransport`] owns the wire connection and multiplexes requests by sequence number
//! (C3). [`Handle`] is a phantom-typed, refcounted reference to a value living in the engine's
//! object store, disposed automatically once the last handle referencing it is dropped (C4).
//! [`Converter`] associates a driver-side type with the engine code needed to move values of
//! that type across the bridge (C5). [`compile_value`]/[`compile_function`]/[`apply`] build and
//! invoke compiled engine functions on top of that (C6).

#[macro_use]
extern crate log;

mod compile;
mod config;
mod converter;
mod error;
mod handle;
mod transport;

pub use compile::{apply, apply2, apply3, apply4, apply5, apply6, apply7, compile_function, compile_value};
pub use config::BridgeConfiguration;
pub use converter::Converter;
pub use error::{BridgeError, BridgeResult};
pub use handle::{Func, Handle};
pub use transport::BridgeTransport;
