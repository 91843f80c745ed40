//! Fiat-Shamir transcript: `t := Hs(t || msg)`.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use sha3::{Digest, Keccak256};

use crate::curve::{hash_to_point, keccak256, reduce32};

/// Domain string of the initial transcript value
pub const TRANSCRIPT_DOMAIN: &[u8] = b"bulletproof_plus_transcript";

/// Running transcript state
#[derive(Clone)]
pub struct Transcript {
    state: [u8; 32],
}

impl Transcript {
    /// Start from `Hp(Keccak256("bulletproof_plus_transcript"))`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: hash_to_point(&keccak256(TRANSCRIPT_DOMAIN))
                .compress()
                .to_bytes(),
        }
    }

    /// Absorb the commitment vector as `Hs(V_0 || … || V_{m-1})`.
    pub fn absorb_commitments(&mut self, commitments: &[EdwardsPoint]) -> Scalar {
        let mut hasher = Keccak256::new();
        for v in commitments {
            hasher.update(v.compress().as_bytes());
        }
        let mash = reduce32(hasher.finalize().into());
        self.challenge_scalars(&[mash])
    }

    /// Update with points and return the new state as a scalar.
    pub fn challenge(&mut self, points: &[&EdwardsPoint]) -> Scalar {
        let mut hasher = Keccak256::new();
        hasher.update(self.state);
        for p in points {
            hasher.update(p.compress().as_bytes());
        }
        self.finish(hasher)
    }

    /// Update with scalars and return the new state as a scalar.
    pub fn challenge_scalars(&mut self, scalars: &[Scalar]) -> Scalar {
        let mut hasher = Keccak256::new();
        hasher.update(self.state);
        for s in scalars {
            hasher.update(s.as_bytes());
        }
        self.finish(hasher)
    }

    fn finish(&mut self, hasher: Keccak256) -> Scalar {
        let challenge = reduce32(hasher.finalize().into());
        self.state = challenge.to_bytes();
        challenge
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;

    #[test]
    fn test_transcript_chains() {
        let g = ED25519_BASEPOINT_POINT;
        let mut t1 = Transcript::new();
        let mut t2 = Transcript::new();
        let a = t1.challenge(&[&g]);
        assert_eq!(a, t2.challenge(&[&g]));
        let b = t1.challenge(&[]);
        assert_ne!(a, b);
        assert_eq!(b, crate::curve::hash_to_scalar(a.as_bytes()));
    }
}
