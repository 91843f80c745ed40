//! Amount encryption and commitment-mask derivation
//!
//! Both are keyed by the per-output scalar `s_i`:
//!
//! ```text
//! amount_key = Keccak256("amount" || s_i)          (first 8 bytes used)
//! mask       = Hs("commitment_mask" || s_i)
//! C_i        = mask·G + v·H
//! ```

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::curve::{commit, hash_to_scalar_parts, keccak256_parts};
use crate::types::errors::CryptoResult;

/// Domain prefix of the amount key
pub const AMOUNT_DOMAIN: &[u8] = b"amount";

/// Domain prefix of the commitment mask
pub const COMMITMENT_MASK_DOMAIN: &[u8] = b"commitment_mask";

/// `Keccak256("amount" || s_i)`
#[must_use]
pub fn amount_key(output_scalar: &Scalar) -> [u8; 32] {
    keccak256_parts(&[AMOUNT_DOMAIN, output_scalar.as_bytes()])
}

/// XOR an 8-byte amount field with the first 8 bytes of the amount key.
fn xor_amount(bytes: [u8; 8], output_scalar: &Scalar) -> [u8; 8] {
    let key = amount_key(output_scalar);
    let mut out = bytes;
    for (byte, k) in out.iter_mut().zip(key.iter()) {
        *byte ^= k;
    }
    out
}

/// Recover the atomic amount from an 8-byte `ecdhInfo` entry.
///
/// # Example
///
/// ```rust,ignore
/// let amount = decrypt_amount(encrypted, &shared.output_scalar(0));
/// ```
#[must_use]
pub fn decrypt_amount(encrypted: [u8; 8], output_scalar: &Scalar) -> u64 {
    u64::from_le_bytes(xor_amount(encrypted, output_scalar))
}

/// Produce the 8-byte `ecdhInfo` entry for `amount`.
#[must_use]
pub fn encrypt_amount(amount: u64, output_scalar: &Scalar) -> [u8; 8] {
    xor_amount(amount.to_le_bytes(), output_scalar)
}

/// Blinding factor of the output commitment, `Hs("commitment_mask" || s_i)`.
#[must_use]
pub fn commitment_mask(output_scalar: &Scalar) -> Scalar {
    hash_to_scalar_parts(&[COMMITMENT_MASK_DOMAIN, output_scalar.as_bytes()])
}

/// Reconstruct `C_i = mask·G + v·H` the way the sender built it.
pub fn output_commitment(output_scalar: &Scalar, amount: u64) -> CryptoResult<EdwardsPoint> {
    commit(&commitment_mask(output_scalar), amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{point_from_hex, scalar_from_hex};
    use crate::derivation::SharedSecret;

    #[test]
    fn test_decrypt_amount_vector() {
        let r = point_from_hex(
            "b8cdf95be694f3b0cbb5174ea1945f95097706adfc889a8d6be92d42b0cd06ff",
            "R",
        )
        .unwrap();
        let a = scalar_from_hex(
            "7c14de0bd019c6cda063c2e458083d3c9f891a4b962cb730a83352da8d61f604",
            "a",
        )
        .unwrap();
        let shared = SharedSecret::receiver(&a, &r);
        let encrypted: [u8; 8] = hex::decode("277ede35c7f0cf5b").unwrap().try_into().unwrap();

        let amount = decrypt_amount(encrypted, &shared.output_scalar(0));
        assert_eq!(amount, 33_592_475_285);
    }

    #[test]
    fn test_encrypt_decrypt_inverse() {
        let s = Scalar::from(987_654_321u64);
        for amount in [0u64, 1, 1_000_000_000_000, u64::MAX] {
            assert_eq!(decrypt_amount(encrypt_amount(amount, &s), &s), amount);
        }
    }

    #[test]
    fn test_commitment_depends_on_scalar_and_amount() {
        let s0 = Scalar::from(1u64);
        let s1 = Scalar::from(2u64);
        let c = output_commitment(&s0, 500).unwrap();
        assert_ne!(c, output_commitment(&s1, 500).unwrap());
        assert_ne!(c, output_commitment(&s0, 501).unwrap());
        assert_eq!(c, commit(&commitment_mask(&s0), 500).unwrap());
    }
}
