//! CLSAG signature types.

use alloc::vec::Vec;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

/// A completed CLSAG signature as it appears in the prunable ring-CT data.
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsagSignature {
    /// Response scalars, one per ring member.
    pub s: Vec<Scalar>,

    /// Challenge entering ring index 0.
    pub c1: Scalar,

    /// Commitment key image `D = z·Hp(P_π)`, stored as `D/8`.
    pub D: EdwardsPoint,
}

/// The public side of one input being signed.
#[derive(Debug, Clone, Copy)]
pub struct ClsagRing<'a> {
    /// One-time public keys `P_0..P_{n-1}`.
    pub keys: &'a [EdwardsPoint],

    /// Output commitments `C_0..C_{n-1}`.
    pub commitments: &'a [EdwardsPoint],

    /// Pseudo-output commitment `C_pseudo` the ring is balanced against.
    pub pseudo_out: EdwardsPoint,
}

/// Signature plus the key image `I = x·Hp(P_π)` that goes into the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedClsag {
    /// The ring signature.
    pub signature: ClsagSignature,

    /// Linking tag of the real output.
    pub key_image: EdwardsPoint,
}
