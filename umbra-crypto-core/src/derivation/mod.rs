//! Output derivations
//!
//! Everything a sender and a receiver compute from the Diffie-Hellman
//! shared secret of one transaction:
//!
//! 1. `D = 8·a·R` (receiver) or `8·r·A` (sender)
//! 2. `s_i = Hs(D || varint(i))`
//! 3. one-time key `P_i = s_i·G + B`, view tag, amount key, commitment mask
//!
//! Key images live in [`crate::keys`].

pub mod amounts;
pub mod shared;
pub mod utils;

pub use amounts::{
    amount_key, commitment_mask, decrypt_amount, encrypt_amount, output_commitment,
};
pub use shared::{one_time_public_key, one_time_secret_key, SharedSecret};
pub use utils::encode_varint;
