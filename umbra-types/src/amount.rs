//! Atomic-unit amounts and display helpers.

use alloc::format;
use alloc::string::String;

/// Atomic units in one whole coin (10^12)
pub const ATOMIC_UNITS_PER_COIN: u64 = 1_000_000_000_000;

/// Smallest unit name
pub const ATOMIC_UNIT_NAME: &str = "piconero";

/// Render an atomic amount as a decimal coin string with 12 fractional digits.
///
/// ```rust
/// assert_eq!(umbra_types::format_atomic(33_592_475_285), "0.033592475285");
/// ```
#[must_use]
pub fn format_atomic(atomic: u64) -> String {
    let whole = atomic / ATOMIC_UNITS_PER_COIN;
    let frac = atomic % ATOMIC_UNITS_PER_COIN;
    format!("{whole}.{frac:012}")
}

/// Parse a decimal coin string into atomic units.
///
/// Accepts at most 12 fractional digits. Returns `None` on malformed input
/// or overflow.
#[must_use]
pub fn parse_atomic(s: &str) -> Option<u64> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 12 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_value: u64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    for _ in frac.len()..12 {
        frac_value *= 10;
    }
    whole
        .checked_mul(ATOMIC_UNITS_PER_COIN)?
        .checked_add(frac_value)
}
