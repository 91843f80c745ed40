//! # umbra-wire
//!
//! Byte-level codecs for the umbra light peer.
//!
//! - **Portable storage**: the self-describing entry tree every peer payload
//!   uses, with its 2-bit-marker size varint
//! - **Levin framing**: the 33-byte header, payload ceiling, commands
//! - **Typed messages**: handshake, timed sync, ping and the chain-sync
//!   notifications, each mapped to and from an entry tree
//! - **Block and transaction codec**: consensus layout with LEB128 varints,
//!   prefix hash, ring-CT blob, transaction and block ids
//!
//! No curve arithmetic happens here; keys, commitments and proofs travel as
//! 32-byte arrays and are interpreted by `umbra-crypto-core`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod levin;
pub mod p2p;
pub mod storage;
pub mod tx;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{WireError, WireResult};
    pub use crate::levin::{Command, LevinHeader};
    pub use crate::p2p::{Message, Notification};
    pub use crate::storage::{Array, Section, Value};
    pub use crate::tx::{Block, Transaction};
}

/// Re-export commonly used types at crate root
pub use error::{WireError, WireResult};

// Re-export framing
pub use levin::{frame, Command, LevinHeader, DEFAULT_MAX_PAYLOAD, HEADER_LENGTH};

// Re-export the entry tree
pub use storage::{from_bytes, to_bytes, Array, Section, Value};

// Re-export typed messages
pub use p2p::{Message, Notification};

// Re-export the consensus codec
pub use tx::{Block, BlockHeader, Extra, Transaction, TransactionPrefix};
