//! Point decoding, hash-to-point and Pedersen commitments.

use alloc::format;

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;

use super::scalar::{keccak512, reduce64};
use crate::types::errors::{CryptoError, CryptoResult};

/// Second generator `H` used for amounts in Pedersen commitments.
///
/// `H = 8 · to_point(Keccak256(G))`, fixed by the protocol.
pub const H_BYTES: [u8; 32] = [
    0x8b, 0x65, 0x59, 0x70, 0x15, 0x37, 0x99, 0xaf, 0x2a, 0xea, 0xdc, 0x9f, 0xf1, 0xad, 0xd0, 0xea,
    0x6c, 0x72, 0x51, 0xd5, 0x41, 0x54, 0xcf, 0xa9, 0x2c, 0x17, 0x3a, 0x0d, 0xd3, 0x9c, 0x1f, 0x94,
];

/// Decompress 32 bytes into a point. The result may carry a torsion
/// component; see [`decompress_prime_order`].
pub fn decompress_point(bytes: &[u8; 32], field: &str) -> CryptoResult<EdwardsPoint> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or_else(|| CryptoError::InvalidPoint(field.into()))
}

/// Decompress and require membership of the prime-order subgroup.
pub fn decompress_prime_order(bytes: &[u8; 32], field: &str) -> CryptoResult<EdwardsPoint> {
    let point = decompress_point(bytes, field)?;
    if !point.is_torsion_free() {
        return Err(CryptoError::TorsionedPoint(field.into()));
    }
    Ok(point)
}

/// Parse a compressed point from 64 hex characters.
pub fn point_from_hex(hex_str: &str, field: &str) -> CryptoResult<EdwardsPoint> {
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
    decompress_point(&array, field)
}

/// Hp: `8 · ((Keccak512(data) mod ℓ) · G)`.
#[must_use]
pub fn hash_to_point(data: &[u8]) -> EdwardsPoint {
    let scalar = reduce64(&keccak512(data));
    (&scalar * ED25519_BASEPOINT_TABLE).mul_by_cofactor()
}

/// The amount generator `H` as a point.
pub fn h_generator() -> CryptoResult<EdwardsPoint> {
    CompressedEdwardsY(H_BYTES)
        .decompress()
        .ok_or_else(|| CryptoError::InternalError("H generator decompression failed".into()))
}

/// Pedersen commitment `mask·G + amount·H`.
pub fn commit(mask: &Scalar, amount: u64) -> CryptoResult<EdwardsPoint> {
    let h = h_generator()?;
    Ok(mask * ED25519_BASEPOINT_TABLE + Scalar::from(amount) * h)
}
