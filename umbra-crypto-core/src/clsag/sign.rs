//! CLSAG signing.
//!
//! ```text
//! I   = x·Hp(P_π)            D = z·Hp(P_π)
//! L_π = α·G                  R_π = α·Hp(P_π)
//! L_i = s_i·G + c_i·(μ_P·P_i + μ_C·(C_i - C_pseudo))
//! R_i = s_i·Hp(P_i) + c_i·(μ_P·I + μ_C·D)
//! s_π = α - c_π·(μ_P·x + μ_C·z)
//! ```

use alloc::vec;
use alloc::vec::Vec;

use curve25519_dalek::constants::{ED25519_BASEPOINT_POINT, ED25519_BASEPOINT_TABLE};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use super::constants::MIN_RING_SIZE;
use super::hash::{compute_mixing_coefficients, ring_hash_points, RoundHasher};
use super::types::{ClsagRing, ClsagSignature, SignedClsag};
use super::verify::verify_clsag;
use crate::curve::{inv_eight, random_scalar};
use crate::types::errors::{CryptoError, CryptoResult};

/// Check ring shape before any secret is touched.
pub(crate) fn validate_ring(ring: &ClsagRing<'_>) -> CryptoResult<usize> {
    let n = ring.keys.len();
    if n != ring.commitments.len() {
        return Err(CryptoError::RingLengthMismatch {
            keys: n,
            commitments: ring.commitments.len(),
        });
    }
    if n < MIN_RING_SIZE {
        return Err(CryptoError::RingSizeTooSmall {
            actual: n,
            minimum: MIN_RING_SIZE,
        });
    }
    Ok(n)
}

/// Sign `message` with the ring member at `real_index`.
///
/// `secret_key` is the one-time secret `x` with `x·G = P_π`; `mask_delta` is
/// `z` with `z·G = C_π - C_pseudo`. The finished signature is checked
/// against the ring before it is returned.
///
/// # Errors
///
/// Ring shape errors, [`CryptoError::SecretKeyMismatch`],
/// [`CryptoError::CommitmentMaskMismatch`], or
/// [`CryptoError::ClsagVerificationFailed`] if the self-check fails.
pub fn sign_clsag<R: RngCore + CryptoRng>(
    message: &[u8; 32],
    ring: &ClsagRing<'_>,
    real_index: usize,
    secret_key: &Scalar,
    mask_delta: &Scalar,
    rng: &mut R,
) -> CryptoResult<SignedClsag> {
    let n = validate_ring(ring)?;
    if real_index >= n {
        return Err(CryptoError::SignerIndexOutOfBounds {
            index: real_index,
            ring_size: n,
        });
    }
    if secret_key * ED25519_BASEPOINT_TABLE != ring.keys[real_index] {
        return Err(CryptoError::SecretKeyMismatch);
    }
    if mask_delta * ED25519_BASEPOINT_TABLE != ring.commitments[real_index] - ring.pseudo_out {
        return Err(CryptoError::CommitmentMaskMismatch);
    }

    let hp = ring_hash_points(ring.keys);
    let offsets: Vec<EdwardsPoint> = ring
        .commitments
        .iter()
        .map(|c| c - ring.pseudo_out)
        .collect();

    let key_image = secret_key * hp[real_index];
    let d_full = mask_delta * hp[real_index];
    let d_inv8 = d_full * inv_eight();

    let (mu_p, mu_c) = compute_mixing_coefficients(
        message,
        ring.keys,
        ring.commitments,
        &key_image,
        &d_inv8,
        &ring.pseudo_out,
    );
    let round = RoundHasher::new(message, ring.keys, ring.commitments, &ring.pseudo_out);

    let mut alpha = random_scalar(rng);
    let mut s = vec![Scalar::ZERO; n];
    let mut c = round.challenge(
        &(&alpha * ED25519_BASEPOINT_TABLE),
        &(alpha * hp[real_index]),
    );
    let mut c1 = None;

    let mut i = (real_index + 1) % n;
    while i != real_index {
        if i == 0 {
            c1 = Some(c);
        }
        s[i] = random_scalar(rng);
        let c_p = mu_p * c;
        let c_c = mu_c * c;
        let l_point = EdwardsPoint::vartime_multiscalar_mul(
            [s[i], c_p, c_c],
            [ED25519_BASEPOINT_POINT, ring.keys[i], offsets[i]],
        );
        let r_point =
            EdwardsPoint::vartime_multiscalar_mul([s[i], c_p, c_c], [hp[i], key_image, d_full]);
        c = round.challenge(&l_point, &r_point);
        i = (i + 1) % n;
    }
    if real_index == 0 {
        c1 = Some(c);
    }

    let mut weighted = mu_p * secret_key + mu_c * mask_delta;
    s[real_index] = alpha - c * weighted;
    alpha.zeroize();
    weighted.zeroize();

    let c1 = c1.ok_or_else(|| CryptoError::InternalError("ring walk missed index 0".into()))?;
    let signature = ClsagSignature { s, c1, D: d_inv8 };

    verify_clsag(message, ring, &signature, &key_image)?;
    Ok(SignedClsag {
        signature,
        key_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{commit, hash_to_point};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        keys: Vec<EdwardsPoint>,
        commitments: Vec<EdwardsPoint>,
        pseudo_out: EdwardsPoint,
        x: Scalar,
        z: Scalar,
    }

    fn fixture(rng: &mut StdRng, n: usize, real_index: usize) -> Fixture {
        let x = random_scalar(rng);
        let real_mask = random_scalar(rng);
        let pseudo_mask = random_scalar(rng);
        let amount = 5_000_000_000u64;

        let mut keys = Vec::with_capacity(n);
        let mut commitments = Vec::with_capacity(n);
        for i in 0..n {
            if i == real_index {
                keys.push(&x * ED25519_BASEPOINT_TABLE);
                commitments.push(commit(&real_mask, amount).unwrap());
            } else {
                keys.push(&random_scalar(rng) * ED25519_BASEPOINT_TABLE);
                commitments.push(commit(&random_scalar(rng), 77).unwrap());
            }
        }
        Fixture {
            keys,
            commitments,
            pseudo_out: commit(&pseudo_mask, amount).unwrap(),
            x,
            z: real_mask - pseudo_mask,
        }
    }

    impl Fixture {
        fn ring(&self) -> ClsagRing<'_> {
            ClsagRing {
                keys: &self.keys,
                commitments: &self.commitments,
                pseudo_out: self.pseudo_out,
            }
        }
    }

    #[test]
    fn test_sign_verifies_at_every_position() {
        let mut rng = StdRng::seed_from_u64(11);
        let message = [0x42u8; 32];
        for real_index in [0, 3, 10] {
            let f = fixture(&mut rng, 11, real_index);
            let signed = sign_clsag(&message, &f.ring(), real_index, &f.x, &f.z, &mut rng).unwrap();
            assert_eq!(signed.signature.s.len(), 11);
            assert!(verify_clsag(&message, &f.ring(), &signed.signature, &signed.key_image).is_ok());
        }
    }

    #[test]
    fn test_key_image_is_x_hp() {
        let mut rng = StdRng::seed_from_u64(12);
        let f = fixture(&mut rng, 4, 1);
        let signed = sign_clsag(&[0u8; 32], &f.ring(), 1, &f.x, &f.z, &mut rng).unwrap();
        let expected = f.x * hash_to_point(f.keys[1].compress().as_bytes());
        assert_eq!(signed.key_image, expected);
        assert!(signed.key_image.is_torsion_free());
    }

    #[test]
    fn test_wrong_message_fails() {
        let mut rng = StdRng::seed_from_u64(13);
        let f = fixture(&mut rng, 4, 2);
        let signed = sign_clsag(&[1u8; 32], &f.ring(), 2, &f.x, &f.z, &mut rng).unwrap();
        assert!(verify_clsag(&[2u8; 32], &f.ring(), &signed.signature, &signed.key_image).is_err());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut rng = StdRng::seed_from_u64(14);
        let f = fixture(&mut rng, 4, 2);
        let m = [0u8; 32];

        assert_eq!(
            sign_clsag(&m, &f.ring(), 4, &f.x, &f.z, &mut rng),
            Err(CryptoError::SignerIndexOutOfBounds {
                index: 4,
                ring_size: 4
            })
        );
        assert_eq!(
            sign_clsag(&m, &f.ring(), 1, &f.x, &f.z, &mut rng),
            Err(CryptoError::SecretKeyMismatch)
        );
        assert_eq!(
            sign_clsag(&m, &f.ring(), 2, &f.x, &(f.z + Scalar::ONE), &mut rng),
            Err(CryptoError::CommitmentMaskMismatch)
        );

        let short = ClsagRing {
            keys: &f.keys[..1],
            commitments: &f.commitments[..1],
            pseudo_out: f.pseudo_out,
        };
        assert_eq!(
            sign_clsag(&m, &short, 0, &f.x, &f.z, &mut rng),
            Err(CryptoError::RingSizeTooSmall {
                actual: 1,
                minimum: 2
            })
        );

        let uneven = ClsagRing {
            keys: &f.keys,
            commitments: &f.commitments[..3],
            pseudo_out: f.pseudo_out,
        };
        assert_eq!(
            sign_clsag(&m, &uneven, 0, &f.x, &f.z, &mut rng),
            Err(CryptoError::RingLengthMismatch {
                keys: 4,
                commitments: 3
            })
        );
    }
}
