//! Fixed generator vectors `G_i`, `H_i` for Bulletproof-Plus.
//!
//! ```text
//! H_i = Hp(H || "bulletproof_plus" || varint(2i))
//! G_i = Hp(H || "bulletproof_plus" || varint(2i + 1))
//! ```

use alloc::vec::Vec;

use curve25519_dalek::edwards::EdwardsPoint;

use super::MAX_MN;
use crate::curve::{hash_to_point, H_BYTES};
use crate::derivation::encode_varint;

/// Domain string mixed into every generator
pub const GENERATOR_DOMAIN: &[u8] = b"bulletproof_plus";

/// The `G_i` and `H_i` vectors, `MAX_MN` entries each.
#[derive(Clone)]
pub struct BpPlusGenerators {
    /// `G_i` vector
    pub g: Vec<EdwardsPoint>,
    /// `H_i` vector
    pub h: Vec<EdwardsPoint>,
}

fn exponent(index: u64) -> EdwardsPoint {
    let varint = encode_varint(index);
    let mut data = Vec::with_capacity(H_BYTES.len() + GENERATOR_DOMAIN.len() + varint.len());
    data.extend_from_slice(&H_BYTES);
    data.extend_from_slice(GENERATOR_DOMAIN);
    data.extend_from_slice(&varint);
    hash_to_point(&data)
}

impl BpPlusGenerators {
    /// Derive the full table. Costs 2048 base-point multiplications; prefer
    /// [`BpPlusGenerators::shared`] where `std` is available.
    #[must_use]
    pub fn new() -> Self {
        let mut g = Vec::with_capacity(MAX_MN);
        let mut h = Vec::with_capacity(MAX_MN);
        for i in 0..MAX_MN as u64 {
            h.push(exponent(2 * i));
            g.push(exponent(2 * i + 1));
        }
        Self { g, h }
    }

    /// Process-wide table, derived on first use.
    #[cfg(feature = "std")]
    #[must_use]
    pub fn shared() -> &'static Self {
        static GENERATORS: std::sync::OnceLock<BpPlusGenerators> = std::sync::OnceLock::new();
        GENERATORS.get_or_init(Self::new)
    }
}

impl Default for BpPlusGenerators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_table_shape() {
        let gens = BpPlusGenerators::shared();
        assert_eq!(gens.g.len(), MAX_MN);
        assert_eq!(gens.h.len(), MAX_MN);
        assert_ne!(gens.g[0], gens.h[0]);
        assert_ne!(gens.g[0], gens.g[1]);
        assert!(gens.g[MAX_MN - 1].is_torsion_free());
    }

    #[test]
    fn test_generators_are_deterministic() {
        let gens = BpPlusGenerators::shared();
        assert_eq!(gens.h[5], exponent(10));
        assert_eq!(gens.g[5], exponent(11));
    }
}
