//! Error types for the FEC option.

use thiserror::Error;

/// Result type alias for FEC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling the FEC option.
#[derive(Error, Debug)]
pub enum Error {
    /// Payload is neither 1 nor 4 bytes, or its flags do not fit its length
    #[error("invalid FEC option length: {len} byte payload")]
    InvalidOptionLength {
        /// Length of the rejected payload
        len: usize,
    },

    /// Negotiation byte outside the known encoding types
    #[error("unknown FEC encoding type: {0}")]
    UnknownEncodingType(u8),

    /// Range length does not fit the 24-bit length field
    #[error("FEC range length {0} exceeds 24 bits")]
    RangeTooLong(u32),

    /// Per-connection opt-in was refused
    #[error("invalid FEC type {value}: {reason}")]
    InvalidSetType {
        /// Value the caller asked for
        value: i32,
        /// Why it was refused
        reason: &'static str,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while loading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new set-type rejection
    pub fn invalid_set_type(value: i32, reason: &'static str) -> Self {
        Error::InvalidSetType { value, reason }
    }

    /// Check if this error is absorbed by the receive path.
    ///
    /// Soft errors mean "no valid FEC signal on this segment" and never reach
    /// the host stack.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Error::InvalidOptionLength { .. } | Error::UnknownEncodingType(_)
        )
    }
}
