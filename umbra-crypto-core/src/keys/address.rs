//! Address decoding and encoding with checksum verification.
//!
//! Layout of the decoded payload:
//!
//! ```text
//! [tag:1][spend_public:32][view_public:32]([payment_id:8])[checksum:4]
//! checksum = Keccak256(everything before it)[..4]
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use umbra_types::Network;

use super::base58;
use crate::curve::keccak256;
use crate::types::address::{
    AddressType, DecodedAddress, CHECKSUM_LENGTH, INTEGRATED_ADDRESS_DECODED_LENGTH,
    PAYMENT_ID_LENGTH, PUBLIC_KEY_LENGTH, STANDARD_ADDRESS_DECODED_LENGTH,
};
use crate::types::errors::{CryptoError, CryptoResult};

/// Decode the raw payload of an address without interpreting it.
///
/// Returns the full decoded bytes, checksum included, after verifying the
/// checksum.
pub fn decode_address_bytes(address: &str) -> CryptoResult<Vec<u8>> {
    let decoded = base58::decode(address.trim())?;
    if decoded.len() <= CHECKSUM_LENGTH {
        return Err(CryptoError::InvalidAddressLength {
            expected: STANDARD_ADDRESS_DECODED_LENGTH,
            actual: decoded.len(),
        });
    }

    let body_len = decoded.len() - CHECKSUM_LENGTH;
    let expected = keccak256(&decoded[..body_len]);
    let actual = &decoded[body_len..];
    if &expected[..CHECKSUM_LENGTH] != actual {
        return Err(CryptoError::ChecksumMismatch {
            expected: hex::encode(&expected[..CHECKSUM_LENGTH]),
            actual: hex::encode(actual),
        });
    }
    Ok(decoded)
}

/// Decode and validate an address.
///
/// # Errors
///
/// - `Base58DecodeFailed` on bad characters or block overflow
/// - `ChecksumMismatch` if the trailing 4 bytes disagree
/// - `InvalidAddressPrefix` for an unknown tag
/// - `InvalidAddressLength` if the payload size does not fit the tag
pub fn decode_address(address: &str) -> CryptoResult<DecodedAddress> {
    let decoded = decode_address_bytes(address)?;
    let tag = decoded[0];
    let (network, address_type) =
        AddressType::from_prefix(tag).ok_or(CryptoError::InvalidAddressPrefix(tag))?;

    let expected_len = match address_type {
        AddressType::Integrated => INTEGRATED_ADDRESS_DECODED_LENGTH,
        AddressType::Standard | AddressType::Subaddress => STANDARD_ADDRESS_DECODED_LENGTH,
    };
    if decoded.len() != expected_len {
        return Err(CryptoError::InvalidAddressLength {
            expected: expected_len,
            actual: decoded.len(),
        });
    }

    let mut spend_public = [0u8; PUBLIC_KEY_LENGTH];
    spend_public.copy_from_slice(&decoded[1..1 + PUBLIC_KEY_LENGTH]);
    let mut view_public = [0u8; PUBLIC_KEY_LENGTH];
    view_public.copy_from_slice(&decoded[1 + PUBLIC_KEY_LENGTH..1 + 2 * PUBLIC_KEY_LENGTH]);

    let payment_id = if address_type == AddressType::Integrated {
        let start = 1 + 2 * PUBLIC_KEY_LENGTH;
        let mut id = [0u8; PAYMENT_ID_LENGTH];
        id.copy_from_slice(&decoded[start..start + PAYMENT_ID_LENGTH]);
        Some(id)
    } else {
        None
    };

    Ok(DecodedAddress {
        network,
        address_type,
        spend_public,
        view_public,
        payment_id,
    })
}

/// Encode an address from its parts. The payment id is only written for
/// integrated addresses.
#[must_use]
pub fn encode_address(
    network: Network,
    address_type: AddressType,
    spend_public: &[u8; PUBLIC_KEY_LENGTH],
    view_public: &[u8; PUBLIC_KEY_LENGTH],
    payment_id: Option<&[u8; PAYMENT_ID_LENGTH]>,
) -> String {
    let mut payload = Vec::with_capacity(INTEGRATED_ADDRESS_DECODED_LENGTH);
    payload.push(address_type.prefix(network));
    payload.extend_from_slice(spend_public);
    payload.extend_from_slice(view_public);
    if address_type == AddressType::Integrated {
        payload.extend_from_slice(payment_id.unwrap_or(&[0u8; PAYMENT_ID_LENGTH]));
    }
    let checksum = keccak256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LENGTH]);
    base58::encode(&payload)
}
