use thiserror::Error;

/// Failures that can occur while framing or parsing the wire format itself.
///
/// `WireError` is about the *bytes* — an unknown tag, a string whose declared length
/// was rejected, an underlying I/O failure. It says nothing about what the command or
/// reply meant; that's [`EngineError`](crate) / `BridgeError` territory one layer up.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WireError {
    /// Error occured in communication with the peer process.
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// An unrecognized `Data` tag byte was read from the stream.
    #[error("unknown Data tag byte {0:#04x}")]
    UnknownDataTag(u8),

    /// An unrecognized command tag byte was read from the stream.
    #[error("unknown command tag byte {0:#04x}")]
    UnknownCommandTag(u8),

    /// An unrecognized reply status tag byte was read from the stream.
    #[error("unknown reply tag byte {0:#04x}")]
    UnknownReplyTag(u8),

    /// A declared string length exceeded the configured maximum.
    ///
    /// The declared number of bytes has already been discarded from the stream by the
    /// time this error is produced, so the stream stays in sync and the session
    /// remains usable.
    #[error("string length {declared} exceeds maximum {max}")]
    StringTooLong { declared: u32, max: u32 },

    /// A declared list length was absurd enough that honoring it would be an
    /// unbounded-allocation hazard before a single element has been read.
    #[error("list length {declared} exceeds maximum {max}")]
    ListTooLong { declared: u64, max: u64 },
}

/// Abbreviation of `Result<T, WireError>`.
pub type WireResult<T> = std::result::Result<T, WireError>;
