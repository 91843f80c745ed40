//! Portable-storage size varint.
//!
//! The low two bits of the first byte select the width; the value lives in
//! the remaining bits, little-endian:
//!
//! ```text
//! 0b00  1 byte   value < 2^6
//! 0b01  2 bytes  value < 2^14
//! 0b10  4 bytes  value < 2^30
//! 0b11  8 bytes  value < 2^62
//! ```
//!
//! Not to be confused with the LEB128 varint of the transaction codec in
//! [`crate::tx::varint`].

use crate::error::{WireError, WireResult};

/// Largest value the encoding can carry.
pub const MAX_VALUE: u64 = (1 << 62) - 1;

const SIZE_MASK: u8 = 0b11;

/// Decode a varint from the front of `bytes`, returning `(consumed, value)`.
///
/// # Errors
///
/// [`WireError::MalformedStream`] when `bytes` is empty or shorter than the
/// width the marker announces.
pub fn decode(bytes: &[u8]) -> WireResult<(usize, u64)> {
    let first = *bytes
        .first()
        .ok_or_else(|| WireError::MalformedStream("empty varint".into()))?;
    let width = 1usize << (first & SIZE_MASK);
    if bytes.len() < width {
        return Err(WireError::MalformedStream(format!(
            "varint announces {width} bytes, {} available",
            bytes.len()
        )));
    }
    let mut raw = [0u8; 8];
    raw[..width].copy_from_slice(&bytes[..width]);
    Ok((width, u64::from_le_bytes(raw) >> 2))
}

/// Append the encoding of `value` to `out`.
///
/// # Errors
///
/// [`WireError::MalformedStream`] for values above [`MAX_VALUE`].
pub fn encode_into(value: u64, out: &mut Vec<u8>) -> WireResult<()> {
    let (marker, width) = match value {
        0..=0x3f => (0b00u64, 1usize),
        0x40..=0x3fff => (0b01, 2),
        0x4000..=0x3fff_ffff => (0b10, 4),
        0x4000_0000..=MAX_VALUE => (0b11, 8),
        _ => {
            return Err(WireError::MalformedStream(format!(
                "varint value {value} exceeds {MAX_VALUE}"
            )))
        }
    };
    let raw = (value << 2) | marker;
    out.extend_from_slice(&raw.to_le_bytes()[..width]);
    Ok(())
}

/// Encode `value` into a fresh buffer.
///
/// # Errors
///
/// See [`encode_into`].
pub fn encode(value: u64) -> WireResult<Vec<u8>> {
    let mut out = Vec::with_capacity(8);
    encode_into(value, &mut out)?;
    Ok(out)
}
