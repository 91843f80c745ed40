//! # umbra-crypto-core
//!
//! Cryptographic core of the umbra light peer.
//!
//! - **Curve primitives**: scalar reduction, Keccak-based `Hs`/`Hp`, point
//!   decoding with subgroup checks, Pedersen commitments
//! - **Output derivations**: shared secret, one-time keys, view tags,
//!   amount encryption, commitment masks
//! - **Keys**: address encode/decode, scan key sets, key images
//! - **Bulletproof-Plus**: aggregated range proofs for up to 16 amounts
//! - **CLSAG**: linkable ring signatures, one per input
//!
//! ## Architecture
//!
//! 1. **`no_std` Compatible**: only `alloc` is required; `std` adds the
//!    cached generator table and `std::error::Error`
//! 2. **Constant-Time Operations**: secret-dependent multi-scalar products use
//!    the constant-time paths of `curve25519-dalek`
//! 3. **Zeroize on Drop**: shared secrets and scan keys clear themselves
//! 4. **Caller-supplied randomness**: every prover takes an RNG, so tests can
//!    seed it
//!
//! ## Modules
//!
//! - [`types`]: error enum and address layout
//! - [`curve`]: `Hs`, `Hp`, `H`, commitments
//! - [`derivation`]: everything derived from `D = 8·a·R`
//! - [`keys`]: base58 addresses, [`keys::ScanKeys`], key images
//! - [`bulletproofs`]: Bulletproof-Plus prover
//! - [`clsag`]: CLSAG signer
//!
//! ## Security Considerations
//!
//! - Never log or serialize secret keys
//! - [`keys::ScanKeys`] redacts secrets in its `Debug` output

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(non_snake_case)]

extern crate alloc;

pub mod bulletproofs;
pub mod clsag;
pub mod curve;
pub mod derivation;
pub mod keys;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bulletproofs::{BpPlusGenerators, BulletproofPlus};
    pub use crate::clsag::{ClsagRing, ClsagSignature, SignedClsag};
    pub use crate::derivation::SharedSecret;
    pub use crate::keys::ScanKeys;
    pub use crate::types::errors::*;
    pub use crate::types::*;
}

/// Re-export commonly used types at crate root
pub use types::errors::{CryptoError, CryptoResult};

// Re-export address types
pub use types::address::{AddressType, DecodedAddress};

// Re-export curve helpers
pub use curve::{
    commit, decompress_point, decompress_prime_order, h_generator, hash_to_point, hash_to_scalar,
    inv_eight, keccak256, random_scalar, H_BYTES,
};

// Re-export derivations
pub use derivation::{
    commitment_mask, decrypt_amount, encode_varint, encrypt_amount, one_time_public_key,
    one_time_secret_key, output_commitment, SharedSecret,
};

// Re-export key handling
pub use keys::{
    compute_key_image, decode_address, derive_key_image, encode_address, KeyImageResult, ScanKeys,
};

// Re-export Bulletproof-Plus
pub use bulletproofs::{prove as prove_bulletproof_plus, BpPlusGenerators, BulletproofPlus};

// Re-export CLSAG
pub use clsag::{sign_clsag, verify_clsag, ClsagRing, ClsagSignature, SignedClsag};

// Curve types callers need to hold results
pub use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
pub use curve25519_dalek::scalar::Scalar;
