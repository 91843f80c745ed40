//! Bulletproof-Plus aggregated range proofs
//!
//! Proves that each of up to [`MAX_OUTPUTS`] commitments
//! `V_j = (γ_j·G + v_j·H) / 8` opens to a 64-bit amount. The number of
//! proven values is padded to the next power of two `m`; padding slots
//! carry amount 0 and mask 0 and contribute no `V_j`.
//!
//! # Flow
//!
//! ```text
//! V, A            -> transcript -> y, z
//! log2(64·m) rounds of (L, R) -> e_k, fold G', H', a', b'
//! A1, B           -> transcript -> e -> r1, s1, d1
//! ```

pub mod generators;
pub mod prove;
pub mod transcript;
pub mod types;
#[cfg(test)]
pub(crate) mod verify;

pub use generators::BpPlusGenerators;
pub use prove::prove;
pub use types::BulletproofPlus;

/// Bits per proven amount
pub const BITS: usize = 64;

/// Maximum number of amounts aggregated in one proof
pub const MAX_OUTPUTS: usize = 16;

/// Size of each generator vector (`BITS · MAX_OUTPUTS`)
pub const MAX_MN: usize = BITS * MAX_OUTPUTS;
