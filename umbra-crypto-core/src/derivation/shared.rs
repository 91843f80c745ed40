//! Shared secret, per-output scalar, one-time keys and view tags.

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::utils::encode_varint;
use crate::curve::{hash_to_scalar_parts, keccak256_parts};

/// Domain prefix of the view-tag hash
pub const VIEW_TAG_DOMAIN: &[u8] = b"view_tag";

/// Diffie-Hellman shared secret `D = 8·a·R` (receiver) or `8·r·A` (sender).
///
/// Stored compressed since every consumer hashes it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    compressed: [u8; 32],
}

impl SharedSecret {
    /// Receiver side: private view scalar `a` with transaction public key `R`.
    #[must_use]
    pub fn receiver(view_secret: &Scalar, tx_public_key: &EdwardsPoint) -> Self {
        Self::from_point(&(view_secret * tx_public_key).mul_by_cofactor())
    }

    /// Sender side: transaction secret `r` with recipient public view key `A`.
    #[must_use]
    pub fn sender(tx_secret: &Scalar, view_public: &EdwardsPoint) -> Self {
        Self::from_point(&(tx_secret * view_public).mul_by_cofactor())
    }

    fn from_point(point: &EdwardsPoint) -> Self {
        Self {
            compressed: point.compress().to_bytes(),
        }
    }

    /// Compressed `D`
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.compressed
    }

    /// `s_i = Hs(D || varint(i))`
    #[must_use]
    pub fn output_scalar(&self, output_index: u64) -> Scalar {
        let index = encode_varint(output_index);
        hash_to_scalar_parts(&[&self.compressed, &index])
    }

    /// First byte of `Keccak256("view_tag" || D || varint(i))`
    #[must_use]
    pub fn view_tag(&self, output_index: u64) -> u8 {
        let index = encode_varint(output_index);
        keccak256_parts(&[VIEW_TAG_DOMAIN, &self.compressed, &index])[0]
    }
}

/// One-time public key `P_i = s_i·G + B`
#[must_use]
pub fn one_time_public_key(output_scalar: &Scalar, spend_public: &EdwardsPoint) -> EdwardsPoint {
    output_scalar * ED25519_BASEPOINT_TABLE + spend_public
}

/// One-time secret key `x = s_i + b`
#[must_use]
pub fn one_time_secret_key(output_scalar: &Scalar, spend_secret: &Scalar) -> Scalar {
    output_scalar + spend_secret
}
