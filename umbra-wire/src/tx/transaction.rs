//! Transaction prefix and full transaction.

use umbra_types::{KeyImageBytes, PrefixHash, TxId};

use super::extra::Extra;
use super::hash::{keccak256, keccak256_parts};
use super::reader::Reader;
use super::rct::{RctBase, RctPrunable, RctType};
use super::varint::write_varint;
use crate::error::{WireError, WireResult};

/// Coinbase input tag
pub const INPUT_GEN: u8 = 0xff;
/// Ring input tag
pub const INPUT_TO_KEY: u8 = 0x02;
/// Plain one-time key output tag
pub const OUTPUT_KEY: u8 = 0x02;
/// One-time key output followed by a view tag
pub const OUTPUT_TAGGED_KEY: u8 = 0x03;

/// Legacy ring signature element size (`c`, `r`)
const V1_SIGNATURE_SIZE: usize = 64;

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIn {
    /// Coinbase input carrying the block height
    Gen {
        /// Block height
        height: u64,
    },
    /// Spend of one member of a ring of earlier outputs
    ToKey {
        /// Zero under ring-CT
        amount: u64,
        /// Global output indices as deltas from the previous member
        key_offsets: Vec<u64>,
        /// Key image of the real spend
        key_image: KeyImageBytes,
    },
}

impl TxIn {
    /// Ring size, zero for coinbase.
    #[must_use]
    pub fn ring_size(&self) -> usize {
        match self {
            TxIn::Gen { .. } => 0,
            TxIn::ToKey { key_offsets, .. } => key_offsets.len(),
        }
    }

    /// Absolute global indices recovered by prefix sum.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedStream`] when the sum overflows.
    pub fn absolute_offsets(&self) -> WireResult<Vec<u64>> {
        let TxIn::ToKey { key_offsets, .. } = self else {
            return Ok(Vec::new());
        };
        let mut total = 0u64;
        key_offsets
            .iter()
            .map(|delta| {
                total = total
                    .checked_add(*delta)
                    .ok_or_else(|| WireError::MalformedStream("key offset overflow".into()))?;
                Ok(total)
            })
            .collect()
    }

    fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        let offset = reader.position();
        match reader.u8()? {
            INPUT_GEN => Ok(TxIn::Gen {
                height: reader.varint()?,
            }),
            INPUT_TO_KEY => {
                let amount = reader.varint()?;
                let count = reader.count(1)?;
                let key_offsets = (0..count)
                    .map(|_| reader.varint())
                    .collect::<WireResult<Vec<_>>>()?;
                Ok(TxIn::ToKey {
                    amount,
                    key_offsets,
                    key_image: KeyImageBytes::new(reader.array()?),
                })
            }
            tag => Err(WireError::MalformedStream(format!(
                "unsupported input tag {tag:#04x} at offset {offset}"
            ))),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            TxIn::Gen { height } => {
                out.push(INPUT_GEN);
                write_varint(*height, out);
            }
            TxIn::ToKey {
                amount,
                key_offsets,
                key_image,
            } => {
                out.push(INPUT_TO_KEY);
                write_varint(*amount, out);
                write_varint(key_offsets.len() as u64, out);
                for delta in key_offsets {
                    write_varint(*delta, out);
                }
                out.extend_from_slice(key_image.as_bytes());
            }
        }
    }
}

/// Convert sorted absolute indices to the delta form stored on the wire.
///
/// # Errors
///
/// [`WireError::MalformedStream`] if the indices are not strictly increasing.
pub fn relative_offsets(absolute: &[u64]) -> WireResult<Vec<u64>> {
    let mut previous: Option<u64> = None;
    absolute
        .iter()
        .map(|&index| {
            let delta = match previous {
                None => index,
                Some(prev) if index > prev => index - prev,
                Some(_) => {
                    return Err(WireError::MalformedStream(
                        "ring indices must be strictly increasing".into(),
                    ))
                }
            };
            previous = Some(index);
            Ok(delta)
        })
        .collect()
}

/// Destination of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// One-time public key
    Key([u8; 32]),
    /// One-time public key with a one-byte view tag
    TaggedKey {
        /// One-time public key
        key: [u8; 32],
        /// View tag
        view_tag: u8,
    },
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Zero under ring-CT
    pub amount: u64,
    /// Target key
    pub target: OutputTarget,
}

impl TxOut {
    /// One-time public key.
    #[must_use]
    pub fn key(&self) -> &[u8; 32] {
        match &self.target {
            OutputTarget::Key(key) | OutputTarget::TaggedKey { key, .. } => key,
        }
    }

    /// View tag, when the output carries one.
    #[must_use]
    pub fn view_tag(&self) -> Option<u8> {
        match self.target {
            OutputTarget::Key(_) => None,
            OutputTarget::TaggedKey { view_tag, .. } => Some(view_tag),
        }
    }

    fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        let amount = reader.varint()?;
        let offset = reader.position();
        let target = match reader.u8()? {
            OUTPUT_KEY => OutputTarget::Key(reader.array()?),
            OUTPUT_TAGGED_KEY => OutputTarget::TaggedKey {
                key: reader.array()?,
                view_tag: reader.u8()?,
            },
            tag => {
                return Err(WireError::MalformedStream(format!(
                    "unsupported output tag {tag:#04x} at offset {offset}"
                )))
            }
        };
        Ok(Self { amount, target })
    }

    fn write(&self, out: &mut Vec<u8>) {
        write_varint(self.amount, out);
        match &self.target {
            OutputTarget::Key(key) => {
                out.push(OUTPUT_KEY);
                out.extend_from_slice(key);
            }
            OutputTarget::TaggedKey { key, view_tag } => {
                out.push(OUTPUT_TAGGED_KEY);
                out.extend_from_slice(key);
                out.push(*view_tag);
            }
        }
    }
}

/// Everything but the signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPrefix {
    /// 1 for legacy, 2 for ring-CT
    pub version: u64,
    /// Height or timestamp before which outputs are locked
    pub unlock_time: u64,
    /// Inputs
    pub inputs: Vec<TxIn>,
    /// Outputs
    pub outputs: Vec<TxOut>,
    /// Raw extra field
    pub extra: Vec<u8>,
}

impl TransactionPrefix {
    /// Read a prefix.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] or [`WireError::MalformedStream`].
    pub fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        let version = reader.varint()?;
        if version == 0 || version > 2 {
            return Err(WireError::UnsupportedVersion(format!(
                "transaction version {version}"
            )));
        }
        let unlock_time = reader.varint()?;

        let input_count = reader.count(2)?;
        let inputs = (0..input_count)
            .map(|_| TxIn::read(reader))
            .collect::<WireResult<Vec<_>>>()?;

        let output_count = reader.count(34)?;
        let outputs = (0..output_count)
            .map(|_| TxOut::read(reader))
            .collect::<WireResult<Vec<_>>>()?;

        let extra_len = reader.count(1)?;
        let extra = reader.bytes(extra_len)?.to_vec();

        Ok(Self {
            version,
            unlock_time,
            inputs,
            outputs,
            extra,
        })
    }

    /// Append the serialized prefix.
    pub fn write(&self, out: &mut Vec<u8>) {
        write_varint(self.version, out);
        write_varint(self.unlock_time, out);
        write_varint(self.inputs.len() as u64, out);
        for input in &self.inputs {
            input.write(out);
        }
        write_varint(self.outputs.len() as u64, out);
        for output in &self.outputs {
            output.write(out);
        }
        write_varint(self.extra.len() as u64, out);
        out.extend_from_slice(&self.extra);
    }

    /// Serialized prefix.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    /// Keccak-256 over the re-serialized prefix.
    #[must_use]
    pub fn hash(&self) -> PrefixHash {
        PrefixHash::new(keccak256(&self.to_bytes()))
    }

    /// Parsed extra field.
    #[must_use]
    pub fn parsed_extra(&self) -> Extra {
        Extra::parse(&self.extra)
    }

    /// Ring sizes of every input.
    #[must_use]
    pub fn ring_sizes(&self) -> Vec<usize> {
        self.inputs.iter().map(TxIn::ring_size).collect()
    }

    /// True for a single coinbase input.
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs.as_slice(), [TxIn::Gen { .. }])
    }
}

/// Signature data following the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxSignatures {
    /// Legacy ring signatures, kept raw
    V1(Vec<u8>),
    /// Ring-CT; `prunable` is `None` for pruned transactions
    Rct {
        /// Base section
        base: RctBase,
        /// Prunable section
        prunable: Option<RctPrunable>,
    },
}

/// Full transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Prefix
    pub prefix: TransactionPrefix,
    /// Signatures
    pub signatures: TxSignatures,
}

impl Transaction {
    /// Read one transaction, leaving the reader after it.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`], [`WireError::MalformedStream`] or
    /// [`WireError::UnsupportedVersion`].
    pub fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        let prefix = TransactionPrefix::read(reader)?;

        let signatures = if prefix.version == 1 {
            let size: usize = prefix
                .inputs
                .iter()
                .map(|input| input.ring_size() * V1_SIGNATURE_SIZE)
                .sum();
            TxSignatures::V1(reader.bytes(size)?.to_vec())
        } else {
            let base = RctBase::read(reader, prefix.inputs.len(), prefix.outputs.len())?;
            let prunable = if base.rct_type != RctType::Null && reader.remaining() == 0 {
                None
            } else {
                Some(RctPrunable::read(
                    reader,
                    base.rct_type,
                    &prefix.ring_sizes(),
                )?)
            };
            TxSignatures::Rct { base, prunable }
        };

        Ok(Self { prefix, signatures })
    }

    /// Parse a standalone transaction blob.
    ///
    /// # Errors
    ///
    /// As [`Transaction::read`], plus [`WireError::Trailing`].
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(tx)
    }

    /// Append the serialized transaction.
    pub fn write(&self, out: &mut Vec<u8>) {
        self.prefix.write(out);
        match &self.signatures {
            TxSignatures::V1(raw) => out.extend_from_slice(raw),
            TxSignatures::Rct { base, prunable } => {
                base.write(out);
                if let Some(prunable) = prunable {
                    prunable.write(out);
                }
            }
        }
    }

    /// Serialized transaction.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    /// Ring-CT base, if any.
    #[must_use]
    pub fn rct_base(&self) -> Option<&RctBase> {
        match &self.signatures {
            TxSignatures::Rct { base, .. } => Some(base),
            TxSignatures::V1(_) => None,
        }
    }

    /// Transaction id.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] for pruned ring-CT transactions, whose
    /// prunable hash is not known locally.
    pub fn id(&self) -> WireResult<TxId> {
        match &self.signatures {
            TxSignatures::V1(_) => Ok(TxId::new(keccak256(&self.to_bytes()))),
            TxSignatures::Rct { base, prunable } => {
                let prunable_hash = match (base.rct_type, prunable) {
                    (RctType::Null, _) => [0u8; 32],
                    (_, Some(prunable)) => prunable.hash(),
                    (_, None) => return Err(WireError::MissingField("rct prunable".into())),
                };
                Ok(TxId::new(keccak256_parts(&[
                    self.prefix.hash().as_bytes(),
                    &keccak256(&base.to_bytes()),
                    &prunable_hash,
                ])))
            }
        }
    }

    /// Message signed by every CLSAG of this transaction.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] when the transaction has no parsed
    /// ring-CT proofs.
    pub fn clsag_message(&self) -> WireResult<[u8; 32]> {
        let TxSignatures::Rct {
            base,
            prunable: Some(prunable @ RctPrunable::Clsag { .. }),
        } = &self.signatures
        else {
            return Err(WireError::MissingField("rct proofs".into()));
        };
        Ok(clsag_message(
            &self.prefix.hash(),
            &base.to_bytes(),
            &prunable.proof_key_vector(),
        ))
    }
}

/// `Keccak(prefix_hash || Keccak(rct_base) || Keccak(proof keys))`.
#[must_use]
pub fn clsag_message(prefix_hash: &PrefixHash, rct_base: &[u8], proof_keys: &[[u8; 32]]) -> [u8; 32] {
    let keys: Vec<u8> = proof_keys.iter().flatten().copied().collect();
    keccak256_parts(&[
        prefix_hash.as_bytes(),
        &keccak256(rct_base),
        &keccak256(&keys),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::rct::{BulletproofPlusData, ClsagData, EcdhInfo, RangeProofs};

    fn sample_prefix() -> TransactionPrefix {
        TransactionPrefix {
            version: 2,
            unlock_time: 0,
            inputs: vec![TxIn::ToKey {
                amount: 0,
                key_offsets: vec![1000, 5, 300],
                key_image: KeyImageBytes::new([0xaa; 32]),
            }],
            outputs: vec![
                TxOut {
                    amount: 0,
                    target: OutputTarget::TaggedKey {
                        key: [0x11; 32],
                        view_tag: 0x42,
                    },
                },
                TxOut {
                    amount: 0,
                    target: OutputTarget::TaggedKey {
                        key: [0x22; 32],
                        view_tag: 0x07,
                    },
                },
            ],
            extra: [&[0x01][..], &[0x33; 32]].concat(),
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            prefix: sample_prefix(),
            signatures: TxSignatures::Rct {
                base: RctBase {
                    rct_type: RctType::BulletproofPlus,
                    fee: 12_345,
                    pseudo_outs: Vec::new(),
                    ecdh_info: vec![EcdhInfo::Compact([1; 8]), EcdhInfo::Compact([2; 8])],
                    out_pk: vec![[3; 32], [4; 32]],
                },
                prunable: Some(RctPrunable::Clsag {
                    proofs: RangeProofs::BulletproofPlus(vec![BulletproofPlusData {
                        a: [5; 32],
                        a1: [6; 32],
                        b: [7; 32],
                        r1: [8; 32],
                        s1: [9; 32],
                        d1: [10; 32],
                        l: vec![[11; 32]; 7],
                        r: vec![[12; 32]; 7],
                    }]),
                    clsags: vec![ClsagData {
                        s: vec![[13; 32]; 3],
                        c1: [14; 32],
                        d: [15; 32],
                    }],
                    pseudo_outs: vec![[16; 32]],
                }),
            },
        }
    }

    #[test]
    fn test_parse_serialize_identity() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        let parsed = Transaction::parse(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_prefix_hash_covers_prefix_only() {
        let tx = sample_tx();
        let prefix_bytes = tx.prefix.to_bytes();
        assert_eq!(tx.prefix.hash().to_bytes(), keccak256(&prefix_bytes));
        assert!(tx.to_bytes().starts_with(&prefix_bytes));
    }

    #[test]
    fn test_absolute_offsets_prefix_sum() {
        let input = &sample_prefix().inputs[0];
        assert_eq!(input.absolute_offsets().unwrap(), vec![1000, 1005, 1305]);
        assert_eq!(
            relative_offsets(&[1000, 1005, 1305]).unwrap(),
            vec![1000, 5, 300]
        );
        assert!(relative_offsets(&[5, 5]).is_err());
    }

    #[test]
    fn test_view_tag_presence_follows_output_tag() {
        let out = TxOut {
            amount: 0,
            target: OutputTarget::Key([1; 32]),
        };
        assert_eq!(out.view_tag(), None);
        assert_eq!(sample_prefix().outputs[0].view_tag(), Some(0x42));
    }

    #[test]
    fn test_pruned_transaction() {
        let mut tx = sample_tx();
        if let TxSignatures::Rct { prunable, .. } = &mut tx.signatures {
            *prunable = None;
        }
        let parsed = Transaction::parse(&tx.to_bytes()).unwrap();
        assert_eq!(parsed, tx);
        assert!(matches!(parsed.id(), Err(WireError::MissingField(_))));
        assert!(parsed.clsag_message().is_err());
    }

    #[test]
    fn test_txid_binds_prunable() {
        let tx = sample_tx();
        let id = tx.id().unwrap();
        let mut tampered = tx.clone();
        if let TxSignatures::Rct {
            prunable: Some(RctPrunable::Clsag { clsags, .. }),
            ..
        } = &mut tampered.signatures
        {
            clsags[0].c1 = [0; 32];
        }
        assert_ne!(tampered.id().unwrap(), id);
        // the signing message does not cover signatures
        assert_eq!(tampered.clsag_message().unwrap(), tx.clsag_message().unwrap());
    }

    #[test]
    fn test_coinbase_v2() {
        let tx = Transaction {
            prefix: TransactionPrefix {
                version: 2,
                unlock_time: 60,
                inputs: vec![TxIn::Gen { height: 3_000_000 }],
                outputs: vec![TxOut {
                    amount: 600_000_000_000,
                    target: OutputTarget::TaggedKey {
                        key: [9; 32],
                        view_tag: 1,
                    },
                }],
                extra: Vec::new(),
            },
            signatures: TxSignatures::Rct {
                base: RctBase::null(),
                prunable: Some(RctPrunable::Null),
            },
        };
        let bytes = tx.to_bytes();
        assert_eq!(*bytes.last().unwrap(), 0);
        let parsed = Transaction::parse(&bytes).unwrap();
        assert!(parsed.prefix.is_coinbase());
        assert_eq!(parsed, tx);
        let expected = keccak256_parts(&[
            tx.prefix.hash().as_bytes(),
            &keccak256(&[0]),
            &[0u8; 32],
        ]);
        assert_eq!(parsed.id().unwrap().to_bytes(), expected);
    }

    #[test]
    fn test_unknown_input_tag() {
        let mut bytes = Vec::new();
        write_varint(2, &mut bytes);
        write_varint(0, &mut bytes);
        write_varint(1, &mut bytes);
        bytes.push(0x01);
        bytes.extend_from_slice(&[0u8; 40]);
        assert!(matches!(
            Transaction::parse(&bytes),
            Err(WireError::MalformedStream(_))
        ));
    }

    #[test]
    fn test_truncated_prefix() {
        let bytes = sample_tx().to_bytes();
        let err = Transaction::parse(&bytes[..20]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }
}
