use thiserror::Error;

/// A list specifying categories of [`SpinelError`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SpinelError {
    /// The input buffer was shorter than the format demanded.
    /// Recoverable at the frame boundary: the packet is dropped and the
    /// reader keeps going.
    #[error("truncated input: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the format required.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// Structurally invalid content: a bad boolean byte, an unterminated
    /// `U` string, an `i` varint longer than 4 bytes, or similar.
    #[error("malformed value: {0}")]
    Malformed(&'static str),

    /// The format string itself is invalid: `D`/`A` not last in its
    /// enclosing scope, `t`/`A` missing `(...)`, or unbalanced
    /// parentheses.
    #[error("bad format string: {0}")]
    BadFormat(&'static str),

    /// A property identifier was not found in the registry. The payload
    /// is still passed through as raw bytes by the caller; this error is
    /// used internally to signal that no format descriptor was found.
    #[error("unknown property id: {0}")]
    UnknownProperty(u32),

    /// A command identifier was not recognized by the dispatcher.
    #[error("unknown command id: {0}")]
    UnknownCommand(u32),

    /// A blocking wait reached its deadline without a matching item.
    #[error("timed out waiting for response")]
    Timeout,

    /// Error occurred in thread synchronization: a mutex guarding shared
    /// mux state was poisoned by a panicking holder.
    #[error("internal lock was poisoned")]
    PoisonedLock,

    /// Error occurred in communication with the transport.
    #[error(transparent)]
    Transport {
        /// The causing I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// The `Result` type used throughout this crate.
pub type SpinelResult<T> = Result<T, SpinelError>;

impl<T> From<std::sync::PoisonError<T>> for SpinelError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SpinelError::PoisonedLock
    }
}
