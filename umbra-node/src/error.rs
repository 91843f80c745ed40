//! Node error types
//!
//! The error kinds a session, the scanner and the transaction builder can
//! raise, and how far each one is allowed to propagate.

use std::time::Duration;

use thiserror::Error;
use umbra_crypto_core::CryptoError;
use umbra_wire::WireError;

/// Errors raised by the light peer
#[derive(Error, Debug)]
pub enum NodeError {
    /// Portable-storage or varint payload is malformed; drops one message
    #[error("Codec error: {0}")]
    Codec(WireError),

    /// Header invalid or over the payload ceiling; closes the session
    #[error("Frame error: {0}")]
    Frame(WireError),

    /// Non-canonical scalar, invalid point or similar; skips one output
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// View tag matched but the one-time key did not
    #[error("Output {output_index} view tag matched but key did not")]
    ScanMismatch { output_index: usize },

    /// Key matched but the commitment disagrees with our reconstruction
    #[error("Output {output_index} commitment does not match the decoded amount")]
    CommitmentInconsistency { output_index: usize },

    /// Daemon RPC failed while fetching decoys
    #[error("Decoy selection unavailable: {0}")]
    DecoySelectionUnavailable(String),

    /// Peer answered with a failure return code
    #[error("Peer returned code {return_code} for command {command}")]
    Protocol { command: u32, return_code: i32 },

    /// Socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dial or write ceiling hit
    #[error("Timeout: {operation} took longer than {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    Closed,

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transaction construction rejected its inputs
    #[error("Build error: {0}")]
    Build(String),
}

impl From<WireError> for NodeError {
    fn from(err: WireError) -> Self {
        if err.is_frame_error() {
            NodeError::Frame(err)
        } else {
            NodeError::Codec(err)
        }
    }
}

impl NodeError {
    /// True if the session cannot continue after this error
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            NodeError::Frame(_)
                | NodeError::Io(_)
                | NodeError::Timeout { .. }
                | NodeError::Closed
                | NodeError::InvalidState(_)
        )
    }

    /// True for errors confined to a single message or output
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            NodeError::Codec(_)
                | NodeError::Crypto(_)
                | NodeError::ScanMismatch { .. }
                | NodeError::CommitmentInconsistency { .. }
        )
    }
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
