//! Proof object.

use alloc::vec::Vec;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

/// An aggregated Bulletproof-Plus proof.
///
/// All points are stored multiplied by `8^{-1}`. `V` is carried for
/// convenience and is not part of the serialized proof: on the wire the
/// commitments travel as the transaction's output commitments.
#[allow(non_snake_case)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulletproofPlus {
    /// Commitments `(γ_j·G + v_j·H) / 8`
    pub V: Vec<EdwardsPoint>,
    /// Bit-vector commitment
    pub A: EdwardsPoint,
    /// Final-round commitment
    pub A1: EdwardsPoint,
    /// Final-round blinding commitment
    pub B: EdwardsPoint,
    /// Final response on `G'`
    pub r1: Scalar,
    /// Final response on `H'`
    pub s1: Scalar,
    /// Final blinding response
    pub d1: Scalar,
    /// Left round commitments
    pub L: Vec<EdwardsPoint>,
    /// Right round commitments
    pub R: Vec<EdwardsPoint>,
}

impl BulletproofPlus {
    /// Number of folding rounds, `log2(64·m)`.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.L.len()
    }

    /// Compressed `A, A1, B, r1, s1, d1, L.., R..` in proof order.
    ///
    /// This is the key vector a transaction's signing message hashes over.
    #[must_use]
    pub fn key_vector(&self) -> Vec<[u8; 32]> {
        let mut keys = Vec::with_capacity(6 + self.L.len() + self.R.len());
        keys.push(self.A.compress().to_bytes());
        keys.push(self.A1.compress().to_bytes());
        keys.push(self.B.compress().to_bytes());
        keys.push(self.r1.to_bytes());
        keys.push(self.s1.to_bytes());
        keys.push(self.d1.to_bytes());
        keys.extend(self.L.iter().map(|p| p.compress().to_bytes()));
        keys.extend(self.R.iter().map(|p| p.compress().to_bytes()));
        keys
    }
}
