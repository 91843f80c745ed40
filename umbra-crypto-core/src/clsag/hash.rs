//! CLSAG hashing: aggregation coefficients and round challenges.

use alloc::vec::Vec;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use sha3::{Digest, Keccak256};

use super::constants::{pad_domain_separator, CLSAG_AGG_0, CLSAG_AGG_1, CLSAG_DOMAIN};
use crate::curve::{hash_to_point, reduce32};

fn absorb_ring(hasher: &mut Keccak256, ring_keys: &[EdwardsPoint], ring_commitments: &[EdwardsPoint]) {
    for key in ring_keys {
        hasher.update(key.compress().as_bytes());
    }
    for commitment in ring_commitments {
        hasher.update(commitment.compress().as_bytes());
    }
}

/// `Hp(P_i)` for every ring key.
pub(crate) fn ring_hash_points(keys: &[EdwardsPoint]) -> Vec<EdwardsPoint> {
    keys.iter()
        .map(|key| hash_to_point(key.compress().as_bytes()))
        .collect()
}

/// Compute the aggregation coefficients `μ_P` and `μ_C`.
///
/// # Formula
/// ```text
/// μ_P = Hs(CLSAG_agg_0 || m || P_0..P_{n-1} || C_0..C_{n-1} || I || D/8 || C_pseudo)
/// μ_C = Hs(CLSAG_agg_1 || m || P_0..P_{n-1} || C_0..C_{n-1} || I || D/8 || C_pseudo)
/// ```
#[must_use]
pub fn compute_mixing_coefficients(
    message: &[u8; 32],
    ring_keys: &[EdwardsPoint],
    ring_commitments: &[EdwardsPoint],
    key_image: &EdwardsPoint,
    d_inv8: &EdwardsPoint,
    pseudo_out: &EdwardsPoint,
) -> (Scalar, Scalar) {
    let mu = |domain: &[u8]| {
        let mut hasher = Keccak256::new();
        hasher.update(pad_domain_separator(domain));
        hasher.update(message);
        absorb_ring(&mut hasher, ring_keys, ring_commitments);
        hasher.update(key_image.compress().as_bytes());
        hasher.update(d_inv8.compress().as_bytes());
        hasher.update(pseudo_out.compress().as_bytes());
        reduce32(hasher.finalize().into())
    };

    (mu(CLSAG_AGG_0), mu(CLSAG_AGG_1))
}

/// Round challenge hasher.
///
/// ```text
/// c_{i+1} = Hs(CLSAG_round || m || P_0..P_{n-1} || C_0..C_{n-1} || C_pseudo || L_i || R_i)
/// ```
///
/// Everything before `L_i` is fixed for the whole ring, so it is absorbed
/// once and the sponge state is cloned per round.
#[derive(Clone)]
pub struct RoundHasher {
    prefix: Keccak256,
}

impl RoundHasher {
    /// Absorb the fixed part of every round hash.
    #[must_use]
    pub fn new(
        message: &[u8; 32],
        ring_keys: &[EdwardsPoint],
        ring_commitments: &[EdwardsPoint],
        pseudo_out: &EdwardsPoint,
    ) -> Self {
        let mut prefix = Keccak256::new();
        prefix.update(pad_domain_separator(CLSAG_DOMAIN));
        prefix.update(message);
        absorb_ring(&mut prefix, ring_keys, ring_commitments);
        prefix.update(pseudo_out.compress().as_bytes());
        Self { prefix }
    }

    /// Challenge for the next ring position.
    #[must_use]
    pub fn challenge(&self, l_point: &EdwardsPoint, r_point: &EdwardsPoint) -> Scalar {
        let mut hasher = self.prefix.clone();
        hasher.update(l_point.compress().as_bytes());
        hasher.update(r_point.compress().as_bytes());
        reduce32(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::hash_to_scalar;
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;

    #[test]
    fn test_mixing_coefficients_deterministic_and_distinct() {
        let key = ED25519_BASEPOINT_POINT;
        let ring = vec![key, key.mul_by_cofactor()];
        let (mu_p, mu_c) = compute_mixing_coefficients(&[1u8; 32], &ring, &ring, &key, &key, &key);
        let again = compute_mixing_coefficients(&[1u8; 32], &ring, &ring, &key, &key, &key);
        assert_eq!((mu_p, mu_c), again);
        assert_ne!(mu_p, mu_c);

        let other_message = compute_mixing_coefficients(&[2u8; 32], &ring, &ring, &key, &key, &key);
        assert_ne!(other_message.0, mu_p);
    }

    #[test]
    fn test_round_hash_layout() {
        let g = ED25519_BASEPOINT_POINT;
        let ring = vec![g];
        let message = [9u8; 32];
        let hasher = RoundHasher::new(&message, &ring, &ring, &g);

        let mut expected = Vec::new();
        expected.extend_from_slice(&pad_domain_separator(CLSAG_DOMAIN));
        expected.extend_from_slice(&message);
        for _ in 0..5 {
            expected.extend_from_slice(g.compress().as_bytes());
        }
        assert_eq!(hasher.challenge(&g, &g), hash_to_scalar(&expected));
    }
}
