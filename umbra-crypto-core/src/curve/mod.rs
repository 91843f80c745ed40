//! Curve and scalar primitives over edwards25519.
//!
//! Every point that leaves this module through derivation has been
//! multiplied by the cofactor. Raw decompression output is treated as
//! untrusted: [`decompress_point`] is the only way bytes become points, and
//! callers that need prime-order points go through
//! [`decompress_prime_order`].
//!
//! # Hashes
//!
//! ```text
//! Hs(x) = Keccak256(x) mod ℓ
//! Hp(x) = 8 · ( (Keccak512(x) mod ℓ) · G )
//! ```

pub mod point;
pub mod scalar;

pub use point::{
    commit, decompress_point, decompress_prime_order, h_generator, hash_to_point,
    point_from_hex, H_BYTES,
};
pub use scalar::{
    hash_to_scalar, hash_to_scalar_parts, inv_eight, keccak256, keccak256_parts, keccak512,
    random_scalar, reduce32, reduce64, scalar_from_canonical, scalar_from_hex,
};
