//! LEB128 varint used inside derivation hashes.
//!
//! This is the transaction-format varint (7 value bits per byte,
//! continuation bit 0x80). It is unrelated to the peer-protocol varint,
//! whose low two bits carry a size marker.

use alloc::vec::Vec;

/// Encode a u64 as a LEB128 varint
///
/// # Example
///
/// ```rust
/// use umbra_crypto_core::derivation::encode_varint;
///
/// assert_eq!(encode_varint(0), vec![0]);
/// assert_eq!(encode_varint(127), vec![127]);
/// assert_eq!(encode_varint(128), vec![0x80, 0x01]);
/// ```
#[must_use]
pub fn encode_varint(mut n: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(10);
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            result.push(byte);
            break;
        }
        result.push(byte | 0x80);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_varint_small() {
        assert_eq!(encode_varint(0), vec![0]);
        assert_eq!(encode_varint(1), vec![1]);
        assert_eq!(encode_varint(127), vec![127]);
    }

    #[test]
    fn test_encode_varint_large() {
        // 300 = 0b1_0010_1100 -> [0x2c | 0x80, 0x02]
        assert_eq!(encode_varint(300), vec![0xac, 0x02]);
        assert_eq!(encode_varint(u64::MAX).len(), 10);
    }
}
