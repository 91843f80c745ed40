//! Scalar arithmetic helpers mod ℓ and the Keccak hashes built on them.

use alloc::format;

use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use sha3::{Digest, Keccak256, Keccak512};

use crate::types::errors::{CryptoError, CryptoResult};

/// Keccak-256 (original padding, not SHA3-256)
#[inline]
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Keccak-256 over the concatenation of `parts`
#[must_use]
pub fn keccak256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Keccak-512
#[must_use]
pub fn keccak512(data: &[u8]) -> [u8; 64] {
    let hash = Keccak512::digest(data);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hash);
    wide
}

/// Reduce 32 little-endian bytes mod ℓ.
#[inline]
#[must_use]
pub fn reduce32(bytes: [u8; 32]) -> Scalar {
    Scalar::from_bytes_mod_order(bytes)
}

/// Uniform reduction of a 64-byte wide value mod ℓ.
#[inline]
#[must_use]
pub fn reduce64(bytes: &[u8; 64]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(bytes)
}

/// Hs: Keccak-256 of input, reduced mod ℓ.
#[inline]
#[must_use]
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    reduce32(keccak256(data))
}

/// Hs over the concatenation of `parts`, without an intermediate buffer.
#[must_use]
pub fn hash_to_scalar_parts(parts: &[&[u8]]) -> Scalar {
    reduce32(keccak256_parts(parts))
}

/// Parse a scalar, rejecting encodings ≥ ℓ.
pub fn scalar_from_canonical(bytes: [u8; 32], field: &str) -> CryptoResult<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| CryptoError::NonCanonicalScalar(field.into()))
}

/// Parse a canonical scalar from 64 hex characters.
pub fn scalar_from_hex(hex_str: &str, field: &str) -> CryptoResult<Scalar> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| CryptoError::HexDecodeFailed(format!("{field}: {e}")))?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidLength {
            field: field.into(),
            expected: 32,
            actual: bytes.len(),
        })?;
    scalar_from_canonical(array, field)
}

/// 8^{-1} mod ℓ, the factor commitments and proof points are stored with.
#[must_use]
pub fn inv_eight() -> Scalar {
    Scalar::from(8u64).invert()
}

/// Uniformly random nonzero scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let candidate = Scalar::random(rng);
        if candidate != Scalar::ZERO {
            return candidate;
        }
    }
}
