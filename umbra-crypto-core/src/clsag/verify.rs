//! CLSAG ring check.
//!
//! Used by the signer on its own output; received signatures are never
//! verified in production paths.

use alloc::format;

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use super::hash::{compute_mixing_coefficients, ring_hash_points, RoundHasher};
use super::sign::validate_ring;
use super::types::{ClsagRing, ClsagSignature};
use crate::types::errors::{CryptoError, CryptoResult};

/// Recompute the challenge chain from `c1` and require it to close.
///
/// # Errors
///
/// Ring shape errors, or [`CryptoError::ClsagVerificationFailed`] naming the
/// failing check.
pub fn verify_clsag(
    message: &[u8; 32],
    ring: &ClsagRing<'_>,
    signature: &ClsagSignature,
    key_image: &EdwardsPoint,
) -> CryptoResult<()> {
    let n = validate_ring(ring)?;
    if signature.s.len() != n {
        return Err(CryptoError::ClsagVerificationFailed(format!(
            "{} responses for ring of {n}",
            signature.s.len()
        )));
    }
    if !key_image.is_torsion_free() {
        return Err(CryptoError::ClsagVerificationFailed(
            "key image outside prime-order subgroup".into(),
        ));
    }

    let (mu_p, mu_c) = compute_mixing_coefficients(
        message,
        ring.keys,
        ring.commitments,
        key_image,
        &signature.D,
        &ring.pseudo_out,
    );
    let round = RoundHasher::new(message, ring.keys, ring.commitments, &ring.pseudo_out);
    let d_full = signature.D.mul_by_cofactor();
    let hp = ring_hash_points(ring.keys);

    let mut c: Scalar = signature.c1;
    for i in 0..n {
        let c_p = mu_p * c;
        let c_c = mu_c * c;
        let l_point = EdwardsPoint::vartime_multiscalar_mul(
            [signature.s[i], c_p, c_c],
            [ED25519_BASEPOINT_POINT, ring.keys[i], ring.commitments[i] - ring.pseudo_out],
        );
        let r_point = EdwardsPoint::vartime_multiscalar_mul(
            [signature.s[i], c_p, c_c],
            [hp[i], *key_image, d_full],
        );
        c = round.challenge(&l_point, &r_point);
    }

    if c != signature.c1 {
        return Err(CryptoError::ClsagVerificationFailed(
            "challenge chain does not close".into(),
        ));
    }
    Ok(())
}
