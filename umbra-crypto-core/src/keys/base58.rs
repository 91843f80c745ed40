//! Block-wise base58 as used by addresses.
//!
//! Input bytes are cut into 8-byte blocks, each encoded independently into
//! 11 characters; a short final block of `n` bytes encodes into
//! `ENCODED_BLOCK_SIZES[n]` characters.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::types::errors::{CryptoError, CryptoResult};

/// Address alphabet
pub const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded characters for a block of `index` bytes
const ENCODED_BLOCK_SIZES: [usize; FULL_BLOCK_SIZE + 1] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

fn decoded_block_size(encoded_len: usize) -> Option<usize> {
    ENCODED_BLOCK_SIZES.iter().position(|&n| n == encoded_len)
}

fn alphabet_index(ch: u8) -> Option<u64> {
    BASE58_ALPHABET
        .iter()
        .position(|&c| c == ch)
        .map(|i| i as u64)
}

fn decode_block(block: &[u8], out: &mut Vec<u8>) -> CryptoResult<()> {
    let size = decoded_block_size(block.len()).ok_or_else(|| {
        CryptoError::Base58DecodeFailed(format!("invalid block length {}", block.len()))
    })?;

    let mut num: u128 = 0;
    for &ch in block {
        let digit = alphabet_index(ch).ok_or_else(|| {
            CryptoError::Base58DecodeFailed(format!("invalid character {:?}", ch as char))
        })?;
        num = num * 58 + u128::from(digit);
    }

    if (size < FULL_BLOCK_SIZE && num >> (8 * size) != 0) || num > u128::from(u64::MAX) {
        return Err(CryptoError::Base58DecodeFailed("block overflow".into()));
    }

    let bytes = (num as u64).to_be_bytes();
    out.extend_from_slice(&bytes[FULL_BLOCK_SIZE - size..]);
    Ok(())
}

fn encode_block(block: &[u8], out: &mut String) {
    let mut num: u64 = 0;
    for &b in block {
        num = (num << 8) | u64::from(b);
    }
    let width = ENCODED_BLOCK_SIZES[block.len()];
    let mut digits = [BASE58_ALPHABET[0]; FULL_ENCODED_BLOCK_SIZE];
    let mut i = width;
    while num > 0 && i > 0 {
        i -= 1;
        digits[i] = BASE58_ALPHABET[(num % 58) as usize];
        num /= 58;
    }
    for &d in &digits[..width] {
        out.push(d as char);
    }
}

/// Decode an address-style base58 string.
pub fn decode(s: &str) -> CryptoResult<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut result = Vec::with_capacity(bytes.len() * FULL_BLOCK_SIZE / FULL_ENCODED_BLOCK_SIZE + 1);
    for block in bytes.chunks(FULL_ENCODED_BLOCK_SIZE) {
        decode_block(block, &mut result)?;
    }
    Ok(result)
}

/// Encode bytes as address-style base58.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut result);
    }
    result
}
