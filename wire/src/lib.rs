//! Shared wire-level types for the engine bridge.
//!
//! Do not use this crate directly.
//!
//! This crate holds only the framing that both sides of the bridge must agree on
//! byte-for-byte: the recursive [`Data`] carrier, the command/reply tag constants, and
//! the [`ObjectId`] newtype. The driver-facing async codec lives behind the `async`
//! feature, the engine-facing blocking codec behind the `sync` feature; both encode
//! the same [`Data`] shape, so a build with both features is legal (used by tests that
//! run a reference engine and a driver in the same process).

#![deny(missing_debug_implementations)]
#![cfg_attr(not(any(feature = "sync", feature = "async")), allow(dead_code, unused_imports))]

#[macro_use]
extern crate log;

mod data;
mod error;
pub mod tags;

#[cfg(feature = "async")]
pub mod codec_async;
#[cfg(feature = "sync")]
pub mod codec_sync;

pub use data::{Data, ObjectId};
pub use error::{WireError, WireResult};

/// Default cap on a single `Data::String`'s declared length, applied unless a caller
/// supplies a tighter bound. Guards against allocating on the strength of an adversarial
/// or corrupted length prefix before the bytes themselves have even been read.
pub const DEFAULT_MAX_STRING_LEN: u32 = 64 * 1024 * 1024;
