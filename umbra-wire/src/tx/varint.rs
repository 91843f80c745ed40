//! LEB128 varint used inside blocks and transactions.
//!
//! Seven value bits per byte, least significant group first, `0x80` marks
//! continuation. Distinct from the portable-storage varint in
//! [`crate::storage::varint`].

use crate::error::{WireError, WireResult};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LENGTH: usize = 10;

/// Append the encoding of `value`.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Decode from the front of `bytes`, returning `(consumed, value)`.
///
/// # Errors
///
/// - [`WireError::Truncated`] when input ends mid-varint
/// - [`WireError::MalformedStream`] for more than 10 bytes, bits beyond 64,
///   or a non-canonical trailing zero group
pub fn read_varint(bytes: &[u8]) -> WireResult<(usize, u64)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LENGTH {
            break;
        }
        let group = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if shift == 63 && group > 1 {
            return Err(WireError::MalformedStream("varint overflows u64".into()));
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            if byte == 0 && i > 0 {
                return Err(WireError::MalformedStream("non-canonical varint".into()));
            }
            return Ok((i + 1, value));
        }
    }
    if bytes.len() >= MAX_VARINT_LENGTH {
        return Err(WireError::MalformedStream(format!(
            "varint longer than {MAX_VARINT_LENGTH} bytes"
        )));
    }
    Err(WireError::Truncated {
        offset: 0,
        needed: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(value, &mut out);
        out
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7f]);
        assert_eq!(encoded(128), vec![0x80, 0x01]);
        assert_eq!(encoded(300), vec![0xac, 0x02]);
        assert_eq!(encoded(u64::MAX).len(), 10);
    }

    #[test]
    fn test_read_known() {
        assert_eq!(read_varint(&[0xac, 0x02, 0xff]).unwrap(), (2, 300));
        assert_eq!(read_varint(&encoded(u64::MAX)).unwrap(), (10, u64::MAX));
    }

    #[test]
    fn test_overflow_detected() {
        let mut bytes = vec![0xff; 9];
        bytes.push(0x02);
        assert!(matches!(read_varint(&bytes), Err(WireError::MalformedStream(_))));

        let bytes = vec![0x80; 11];
        assert!(matches!(read_varint(&bytes), Err(WireError::MalformedStream(_))));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(read_varint(&[0x80]), Err(WireError::Truncated { .. })));
        assert!(matches!(read_varint(&[]), Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_non_canonical_rejected() {
        assert!(matches!(
            read_varint(&[0x80, 0x00]),
            Err(WireError::MalformedStream(_))
        ));
    }
}
