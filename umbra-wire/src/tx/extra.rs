//! Transaction `extra` field.
//!
//! An untrusted concatenation of tagged records:
//!
//! | tag    | record                                              |
//! |--------|-----------------------------------------------------|
//! | `0x00` | padding: zeros to the end of the field (max 255)   |
//! | `0x01` | transaction public key, 32 bytes                    |
//! | `0x02` | nonce: varint length, bytes (payment id records)    |
//! | `0x03` | merge-mining: varint length, varint depth, 32 bytes |
//! | `0x04` | additional public keys: varint count, 32 bytes each |
//! | `0xDE` | miner gate: varint length, bytes                    |
//!
//! Other tags are taken to carry a varint length and are skipped by it.
//! Parsing stops at the first record that does not fit; everything read
//! before it is kept.

use super::reader::Reader;
use super::varint::write_varint;
use crate::error::{WireError, WireResult};

/// Padding tag
pub const TAG_PADDING: u8 = 0x00;
/// Transaction public key tag
pub const TAG_PUBKEY: u8 = 0x01;
/// Nonce tag
pub const TAG_NONCE: u8 = 0x02;
/// Merge-mining tag
pub const TAG_MERGE_MINING: u8 = 0x03;
/// Additional public keys tag
pub const TAG_ADDITIONAL_PUBKEYS: u8 = 0x04;
/// Miner gate tag
pub const TAG_MINER_GATE: u8 = 0xde;

/// Nonce sub-tag: 32-byte plain payment id
pub const NONCE_PAYMENT_ID: u8 = 0x00;
/// Nonce sub-tag: 8-byte encrypted payment id
pub const NONCE_ENCRYPTED_PAYMENT_ID: u8 = 0x01;

/// Largest padding run
pub const MAX_PADDING: usize = 255;
/// Largest nonce
pub const MAX_NONCE: usize = 255;

/// Payload of a nonce record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nonce {
    /// Unencrypted 32-byte payment id
    PaymentId([u8; 32]),
    /// 8-byte payment id encrypted to the recipient
    EncryptedPaymentId([u8; 8]),
    /// Any other nonce content
    Other(Vec<u8>),
}

impl Nonce {
    fn parse(bytes: &[u8]) -> Self {
        match bytes.split_first() {
            Some((&NONCE_PAYMENT_ID, rest)) if rest.len() == 32 => {
                let mut id = [0u8; 32];
                id.copy_from_slice(rest);
                Nonce::PaymentId(id)
            }
            Some((&NONCE_ENCRYPTED_PAYMENT_ID, rest)) if rest.len() == 8 => {
                let mut id = [0u8; 8];
                id.copy_from_slice(rest);
                Nonce::EncryptedPaymentId(id)
            }
            _ => Nonce::Other(bytes.to_vec()),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Nonce::PaymentId(id) => [&[NONCE_PAYMENT_ID][..], id].concat(),
            Nonce::EncryptedPaymentId(id) => [&[NONCE_ENCRYPTED_PAYMENT_ID][..], id].concat(),
            Nonce::Other(bytes) => bytes.clone(),
        }
    }
}

/// One record of the extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Run of zero bytes, including the tag byte
    Padding(usize),
    /// Transaction public key `R`
    PublicKey([u8; 32]),
    /// Nonce record
    Nonce(Nonce),
    /// Merge-mining commitment
    MergeMining {
        /// Merkle tree depth
        depth: u64,
        /// Merkle root
        merkle_root: [u8; 32],
    },
    /// Per-output public keys `R_i`
    AdditionalPublicKeys(Vec<[u8; 32]>),
    /// Miner gate data
    MinerGate(Vec<u8>),
    /// Unrecognized tag, skipped by its length
    Unknown {
        /// Tag byte
        tag: u8,
        /// Record body
        data: Vec<u8>,
    },
}

/// Parsed extra field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extra {
    /// Records in order
    pub fields: Vec<ExtraField>,
    /// False when parsing stopped early at a malformed record
    pub complete: bool,
}

fn read_field(reader: &mut Reader<'_>) -> WireResult<ExtraField> {
    let tag = reader.u8()?;
    Ok(match tag {
        TAG_PADDING => {
            let rest = reader.bytes(reader.remaining())?;
            if rest.len() + 1 > MAX_PADDING || rest.iter().any(|b| *b != 0) {
                return Err(WireError::MalformedStream("invalid padding".into()));
            }
            ExtraField::Padding(rest.len() + 1)
        }
        TAG_PUBKEY => ExtraField::PublicKey(reader.array()?),
        TAG_NONCE => {
            let len = reader.count(1)?;
            if len > MAX_NONCE {
                return Err(WireError::MalformedStream(format!("nonce of {len} bytes")));
            }
            ExtraField::Nonce(Nonce::parse(reader.bytes(len)?))
        }
        TAG_MERGE_MINING => {
            let len = reader.count(1)?;
            let mut body = Reader::new(reader.bytes(len)?);
            let depth = body.varint()?;
            let merkle_root = body.array()?;
            body.finish()?;
            ExtraField::MergeMining { depth, merkle_root }
        }
        TAG_ADDITIONAL_PUBKEYS => {
            let count = reader.count(32)?;
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(reader.array()?);
            }
            ExtraField::AdditionalPublicKeys(keys)
        }
        TAG_MINER_GATE => {
            let len = reader.count(1)?;
            ExtraField::MinerGate(reader.bytes(len)?.to_vec())
        }
        other => {
            let len = reader.count(1)?;
            ExtraField::Unknown {
                tag: other,
                data: reader.bytes(len)?.to_vec(),
            }
        }
    })
}

impl Extra {
    /// Parse leniently: stop at the first malformed record.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let mut reader = Reader::new(bytes);
        let mut fields = Vec::new();
        while reader.remaining() > 0 {
            match read_field(&mut reader) {
                Ok(field) => fields.push(field),
                Err(_) => {
                    return Self {
                        fields,
                        complete: false,
                    }
                }
            }
        }
        Self {
            fields,
            complete: true,
        }
    }

    /// Empty extra for building.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            complete: true,
        }
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, field: ExtraField) -> Self {
        self.fields.push(field);
        self
    }

    /// First transaction public key.
    #[must_use]
    pub fn tx_public_key(&self) -> Option<[u8; 32]> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::PublicKey(key) => Some(*key),
            _ => None,
        })
    }

    /// Additional per-output public keys, empty when absent.
    #[must_use]
    pub fn additional_public_keys(&self) -> &[[u8; 32]] {
        self.fields
            .iter()
            .find_map(|f| match f {
                ExtraField::AdditionalPublicKeys(keys) => Some(keys.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Encrypted payment id, if any.
    #[must_use]
    pub fn encrypted_payment_id(&self) -> Option<[u8; 8]> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::Nonce(Nonce::EncryptedPaymentId(id)) => Some(*id),
            _ => None,
        })
    }

    /// Serialize the records.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedStream`] for padding or nonce records over
    /// their size limits.
    pub fn to_bytes(&self) -> WireResult<Vec<u8>> {
        let mut out = Vec::new();
        for field in &self.fields {
            match field {
                ExtraField::Padding(n) => {
                    if *n == 0 || *n > MAX_PADDING {
                        return Err(WireError::MalformedStream(format!("padding of {n}")));
                    }
                    out.extend(core::iter::repeat(0u8).take(*n));
                }
                ExtraField::PublicKey(key) => {
                    out.push(TAG_PUBKEY);
                    out.extend_from_slice(key);
                }
                ExtraField::Nonce(nonce) => {
                    let body = nonce.to_bytes();
                    if body.len() > MAX_NONCE {
                        return Err(WireError::MalformedStream(format!(
                            "nonce of {} bytes",
                            body.len()
                        )));
                    }
                    out.push(TAG_NONCE);
                    write_varint(body.len() as u64, &mut out);
                    out.extend_from_slice(&body);
                }
                ExtraField::MergeMining { depth, merkle_root } => {
                    let mut body = Vec::with_capacity(42);
                    write_varint(*depth, &mut body);
                    body.extend_from_slice(merkle_root);
                    out.push(TAG_MERGE_MINING);
                    write_varint(body.len() as u64, &mut out);
                    out.extend_from_slice(&body);
                }
                ExtraField::AdditionalPublicKeys(keys) => {
                    out.push(TAG_ADDITIONAL_PUBKEYS);
                    write_varint(keys.len() as u64, &mut out);
                    for key in keys {
                        out.extend_from_slice(key);
                    }
                }
                ExtraField::MinerGate(data) => {
                    out.push(TAG_MINER_GATE);
                    write_varint(data.len() as u64, &mut out);
                    out.extend_from_slice(data);
                }
                ExtraField::Unknown { tag, data } => {
                    out.push(*tag);
                    write_varint(data.len() as u64, &mut out);
                    out.extend_from_slice(data);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_and_encrypted_payment_id() {
        let mut bytes = vec![TAG_PUBKEY];
        bytes.extend_from_slice(&[0x58; 32]);
        bytes.extend_from_slice(&[TAG_NONCE, 9, NONCE_ENCRYPTED_PAYMENT_ID]);
        bytes.extend_from_slice(&[7u8; 8]);

        let extra = Extra::parse(&bytes);
        assert!(extra.complete);
        assert_eq!(extra.tx_public_key(), Some([0x58; 32]));
        assert_eq!(extra.encrypted_payment_id(), Some([7u8; 8]));
        assert_eq!(extra.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_unknown_tag_skipped_by_length() {
        let mut bytes = vec![0x7a, 3, 1, 2, 3, TAG_PUBKEY];
        bytes.extend_from_slice(&[1u8; 32]);
        let extra = Extra::parse(&bytes);
        assert!(extra.complete);
        assert_eq!(extra.tx_public_key(), Some([1u8; 32]));
        assert_eq!(
            extra.fields[0],
            ExtraField::Unknown {
                tag: 0x7a,
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn test_additional_keys_and_padding() {
        let extra = Extra::new()
            .with(ExtraField::PublicKey([2u8; 32]))
            .with(ExtraField::AdditionalPublicKeys(vec![[3u8; 32], [4u8; 32]]))
            .with(ExtraField::MergeMining {
                depth: 300,
                merkle_root: [5u8; 32],
            })
            .with(ExtraField::MinerGate(vec![9, 9]))
            .with(ExtraField::Padding(4));
        let bytes = extra.to_bytes().unwrap();
        let parsed = Extra::parse(&bytes);
        assert_eq!(parsed, extra);
        assert_eq!(parsed.additional_public_keys().len(), 2);
    }

    #[test]
    fn test_truncated_record_keeps_prefix() {
        let mut bytes = vec![TAG_PUBKEY];
        bytes.extend_from_slice(&[6u8; 32]);
        bytes.extend_from_slice(&[TAG_PUBKEY, 1, 2]);
        let extra = Extra::parse(&bytes);
        assert!(!extra.complete);
        assert_eq!(extra.fields.len(), 1);
        assert_eq!(extra.tx_public_key(), Some([6u8; 32]));
    }

    #[test]
    fn test_nonzero_padding_rejected() {
        let extra = Extra::parse(&[TAG_PADDING, 0, 1]);
        assert!(!extra.complete);
        assert!(extra.fields.is_empty());
    }
}
