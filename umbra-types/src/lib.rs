//! Umbra Shared Types
//!
//! Identifiers and network constants shared between:
//! - `umbra-crypto-core` (address decoding, `no_std`)
//! - `umbra-wire` (block and transaction codec)
//! - `umbra-node` (sessions, scanner, daemon RPC)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  umbra-types (this crate)                                       │
//! │  ├─ 32-byte hash newtypes, not interchangeable                  │
//! │  ├─ Network ids, address tags, default ports                    │
//! │  └─ Atomic-unit amount formatting                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod amount;
pub mod hash;
pub mod network;

pub use amount::*;
pub use hash::*;
pub use network::*;
