//! CLSAG domain separators.

/// Round hash domain separator.
pub const CLSAG_DOMAIN: &[u8] = b"CLSAG_round";

/// Aggregation domain separator for `μ_P`.
pub const CLSAG_AGG_0: &[u8] = b"CLSAG_agg_0";

/// Aggregation domain separator for `μ_C`.
pub const CLSAG_AGG_1: &[u8] = b"CLSAG_agg_1";

/// Smallest ring the signer accepts.
pub const MIN_RING_SIZE: usize = 2;

/// Pad a domain separator into a 32-byte key slot.
#[inline]
#[must_use]
pub fn pad_domain_separator(domain: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = domain.len().min(32);
    padded[..len].copy_from_slice(&domain[..len]);
    padded
}
