//! Wire error types
//!
//! One enum for everything that can go wrong turning bytes into frames,
//! entry trees, blocks and transactions.

use thiserror::Error;

/// Result type alias for wire decoding
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised by the wire codecs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Bytes do not form a valid stream: unknown type byte, bad UTF-8, varint
    /// overflow, declared length past the end of input
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    /// Levin payload length above the configured ceiling
    #[error("Frame too large: {length} bytes exceeds ceiling of {max}")]
    FrameTooLarge {
        /// Declared payload length
        length: u64,
        /// Configured ceiling
        max: u64,
    },

    /// Magic signature did not match
    #[error("Bad signature: {0}")]
    BadSignature(String),

    /// Format or protocol version we do not speak
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// A required entry is absent from a section
    #[error("Missing field: {0}")]
    MissingField(String),

    /// An entry is present but has the wrong type
    #[error("Type mismatch for {field}: expected {expected}")]
    TypeMismatch {
        /// Entry name
        field: String,
        /// Type the caller asked for
        expected: &'static str,
    },

    /// Input ended in the middle of a value
    #[error("Truncated input: needed {needed} more bytes at offset {offset}")]
    Truncated {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes still missing
        needed: usize,
    },

    /// Bytes left over after a complete value
    #[error("Trailing bytes: {0} unread")]
    Trailing(usize),
}

impl WireError {
    /// True for errors that mean the framing itself is broken and the
    /// connection cannot be resynchronized.
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            WireError::FrameTooLarge { .. }
                | WireError::BadSignature(_)
                | WireError::UnsupportedVersion(_)
        )
    }
}
