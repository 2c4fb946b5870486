//! The engine-side half of the bridge (C2): a single-threaded read-dispatch-reply
//! loop, an object store, and the [`Evaluator`] seam through which the loop delegates
//! actual code evaluation.
//!
//! This crate never interprets "the engine's language" itself — what that language is,
//! and how it's evaluated, is entirely behind the [`Evaluator`] trait. The `toy` module
//! provides a small total reference implementation used by this workspace's own tests
//! and by the `demos` crate to exercise the protocol end to end without spawning a real
//! external process.

#![deny(missing_debug_implementations)]

#[macro_use]
extern crate log;

mod engine_loop;
mod error;
mod evaluator;
mod exn;
mod store;
pub mod toy;

pub use engine_loop::EngineLoop;
pub use error::{EngineError, EngineResult};
pub use evaluator::Evaluator;
pub use exn::{ApplyConvention, ExnValue};
pub use store::EngineStore;
