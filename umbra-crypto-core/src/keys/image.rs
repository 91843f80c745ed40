//! Key images and the one-time spend secret behind them.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::curve::hash_to_point;
use crate::derivation::{one_time_secret_key, SharedSecret};

/// `I = x · Hp(P)`
#[must_use]
pub fn compute_key_image(one_time_secret: &Scalar, one_time_public: &EdwardsPoint) -> EdwardsPoint {
    one_time_secret * hash_to_point(one_time_public.compress().as_bytes())
}

/// Result of deriving the spend material for one owned output
#[derive(Clone)]
pub struct KeyImageResult {
    /// One-time secret `x = Hs(D || varint(i)) + b`
    pub one_time_secret: Scalar,
    /// Key image `x · Hp(P)`
    pub key_image: EdwardsPoint,
}

/// Derive `x` and `I` for output `index` of a transaction with shared secret
/// `shared`, owned by the holder of `spend_secret`.
#[must_use]
pub fn derive_key_image(
    shared: &SharedSecret,
    output_index: u64,
    spend_secret: &Scalar,
    one_time_public: &EdwardsPoint,
) -> KeyImageResult {
    let one_time_secret = one_time_secret_key(&shared.output_scalar(output_index), spend_secret);
    let key_image = compute_key_image(&one_time_secret, one_time_public);
    KeyImageResult {
        one_time_secret,
        key_image,
    }
}
