use std::sync::Arc;

use thiserror::Error;
use wire::WireError;

/// Everything that can go wrong on the driver side of the bridge.
///
/// `TransportClosed` is contagious: once the reader task observes it, every outstanding and
/// future in-flight slot is rejected with the same (cloned) error, matching §7's "once raised,
/// every subsequent request fails immediately with the same kind". `WireError` is wrapped behind
/// an `Arc` so that a single fatal framing failure can be cheaply broadcast to every waiting
/// completion slot.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum BridgeError {
    /// The reader hit end-of-stream, or the writer's pipe was closed, outside of a clean
    /// connection shutdown.
    #[error("engine transport closed: {reason}")]
    TransportClosed { reason: String },

    /// A framing-level decode failure on the inbound stream. Always escalates to
    /// `TransportClosed` for the remainder of the session (§7).
    #[error("protocol error: {0}")]
    Protocol(Arc<WireError>),

    /// The engine replied `0x02`; `message` is its own exception description, unchanged.
    #[error("engine error: {0}")]
    Engine(String),

    /// A converter could not make sense of a reply's `Data` shape.
    #[error("converter error: {0}")]
    Converter(String),

    /// The outbound sequence counter wrapped past `u64::MAX` without the corresponding slot
    /// having been retired yet.
    #[error("sequence space exhausted")]
    SequenceExhausted,

    /// A reply arrived whose sequence number matched no in-flight slot (a defensive case; a
    /// conforming engine never produces this).
    #[error("reply for unknown sequence {0}")]
    UnknownSequence(u64),
}

impl From<WireError> for BridgeError {
    fn from(e: WireError) -> Self {
        Self::Protocol(Arc::new(e))
    }
}

impl BridgeError {
    /// Whether this error kind is the contagious, session-ending sort.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportClosed { .. } | Self::Protocol(_))
    }
}

/// Abbreviation of `Result<T, BridgeError>`.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
