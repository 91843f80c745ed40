//! Ring-CT signature blob.
//!
//! The base part is always present: type byte, fee, per-output encrypted
//! amounts and output commitments. The prunable part carries range proofs,
//! ring signatures and pseudo-outputs; it is parsed structurally for the
//! CLSAG types and kept as raw bytes for the older ones.

use super::hash::keccak256;
use super::reader::Reader;
use super::varint::write_varint;
use crate::error::{WireError, WireResult};

/// Ring-CT signature type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RctType {
    /// Coinbase and other unblinded transactions
    Null = 0,
    /// Borromean, single input
    Full = 1,
    /// Borromean, pseudo-outputs in the base
    Simple = 2,
    /// Original Bulletproofs
    Bulletproof = 3,
    /// Bulletproofs with compact amounts
    Bulletproof2 = 4,
    /// CLSAG with Bulletproofs
    Clsag = 5,
    /// CLSAG with Bulletproof-Plus
    BulletproofPlus = 6,
}

impl RctType {
    /// Decode the type byte.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedStream`] for unknown types.
    pub fn from_byte(byte: u8) -> WireResult<Self> {
        Ok(match byte {
            0 => RctType::Null,
            1 => RctType::Full,
            2 => RctType::Simple,
            3 => RctType::Bulletproof,
            4 => RctType::Bulletproof2,
            5 => RctType::Clsag,
            6 => RctType::BulletproofPlus,
            other => {
                return Err(WireError::MalformedStream(format!(
                    "unknown ring-ct type {other}"
                )))
            }
        })
    }

    /// Type byte.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Amounts are 8-byte XOR masks rather than 32-byte mask/amount pairs.
    #[must_use]
    pub fn compact_amounts(self) -> bool {
        self.as_byte() >= RctType::Bulletproof2.as_byte()
    }

    /// Prunable section is parsed into typed proofs.
    #[must_use]
    pub fn structured_prunable(self) -> bool {
        matches!(self, RctType::Clsag | RctType::BulletproofPlus)
    }
}

/// Encrypted amount of one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcdhInfo {
    /// 8-byte amount XORed with the amount key
    Compact([u8; 8]),
    /// Legacy 32-byte mask and amount
    Full {
        /// Encrypted mask
        mask: [u8; 32],
        /// Encrypted amount
        amount: [u8; 32],
    },
}

impl EcdhInfo {
    /// The 8-byte encrypted amount, for compact entries only.
    #[must_use]
    pub fn compact_amount(&self) -> Option<[u8; 8]> {
        match self {
            EcdhInfo::Compact(amount) => Some(*amount),
            EcdhInfo::Full { .. } => None,
        }
    }
}

/// Always-present part of the ring-CT blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RctBase {
    /// Signature type
    pub rct_type: RctType,
    /// Fee in atomic units
    pub fee: u64,
    /// Pseudo-outputs, stored here only by [`RctType::Simple`]
    pub pseudo_outs: Vec<[u8; 32]>,
    /// One entry per output
    pub ecdh_info: Vec<EcdhInfo>,
    /// Output commitments, one per output
    pub out_pk: Vec<[u8; 32]>,
}

impl RctBase {
    /// Base of an unblinded transaction.
    #[must_use]
    pub fn null() -> Self {
        Self {
            rct_type: RctType::Null,
            fee: 0,
            pseudo_outs: Vec::new(),
            ecdh_info: Vec::new(),
            out_pk: Vec::new(),
        }
    }

    /// Read the base for a transaction with the given input and output counts.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] or [`WireError::MalformedStream`].
    pub fn read(reader: &mut Reader<'_>, inputs: usize, outputs: usize) -> WireResult<Self> {
        let rct_type = RctType::from_byte(reader.u8()?)?;
        if rct_type == RctType::Null {
            return Ok(Self::null());
        }
        let fee = reader.varint()?;

        let mut pseudo_outs = Vec::new();
        if rct_type == RctType::Simple {
            pseudo_outs.reserve(inputs);
            for _ in 0..inputs {
                pseudo_outs.push(reader.array()?);
            }
        }

        let mut ecdh_info = Vec::with_capacity(outputs);
        for _ in 0..outputs {
            ecdh_info.push(if rct_type.compact_amounts() {
                EcdhInfo::Compact(reader.array()?)
            } else {
                EcdhInfo::Full {
                    mask: reader.array()?,
                    amount: reader.array()?,
                }
            });
        }

        let mut out_pk = Vec::with_capacity(outputs);
        for _ in 0..outputs {
            out_pk.push(reader.array()?);
        }

        Ok(Self {
            rct_type,
            fee,
            pseudo_outs,
            ecdh_info,
            out_pk,
        })
    }

    /// Append the serialized base.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.rct_type.as_byte());
        if self.rct_type == RctType::Null {
            return;
        }
        write_varint(self.fee, out);
        if self.rct_type == RctType::Simple {
            for pseudo in &self.pseudo_outs {
                out.extend_from_slice(pseudo);
            }
        }
        for info in &self.ecdh_info {
            match info {
                EcdhInfo::Compact(amount) => out.extend_from_slice(amount),
                EcdhInfo::Full { mask, amount } => {
                    out.extend_from_slice(mask);
                    out.extend_from_slice(amount);
                }
            }
        }
        for commitment in &self.out_pk {
            out.extend_from_slice(commitment);
        }
    }

    /// Serialized base.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }
}

/// Serialized Bulletproof-Plus range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletproofPlusData {
    /// `A`
    pub a: [u8; 32],
    /// `A1`
    pub a1: [u8; 32],
    /// `B`
    pub b: [u8; 32],
    /// `r1`
    pub r1: [u8; 32],
    /// `s1`
    pub s1: [u8; 32],
    /// `d1`
    pub d1: [u8; 32],
    /// Left round points
    pub l: Vec<[u8; 32]>,
    /// Right round points
    pub r: Vec<[u8; 32]>,
}

/// Serialized original Bulletproof range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct BulletproofData {
    pub a: [u8; 32],
    pub s: [u8; 32],
    pub t1: [u8; 32],
    pub t2: [u8; 32],
    pub taux: [u8; 32],
    pub mu: [u8; 32],
    pub l: Vec<[u8; 32]>,
    pub r: Vec<[u8; 32]>,
    pub a_final: [u8; 32],
    pub b_final: [u8; 32],
    pub t: [u8; 32],
}

/// Range proofs carried by the prunable section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeProofs {
    /// Type 5
    Bulletproof(Vec<BulletproofData>),
    /// Type 6
    BulletproofPlus(Vec<BulletproofPlusData>),
}

/// Serialized CLSAG for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsagData {
    /// One response per ring member
    pub s: Vec<[u8; 32]>,
    /// Challenge entering ring index 0
    pub c1: [u8; 32],
    /// Commitment key image, premultiplied by `1/8`
    pub d: [u8; 32],
}

/// Prunable part of the ring-CT blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RctPrunable {
    /// Nothing follows a null base
    Null,
    /// CLSAG types
    Clsag {
        /// Range proofs over the outputs
        proofs: RangeProofs,
        /// One signature per input
        clsags: Vec<ClsagData>,
        /// One pseudo-output commitment per input
        pseudo_outs: Vec<[u8; 32]>,
    },
    /// Older types, left unparsed
    Raw(Vec<u8>),
}

fn read_points(reader: &mut Reader<'_>) -> WireResult<Vec<[u8; 32]>> {
    let count = reader.count(32)?;
    (0..count).map(|_| reader.array()).collect()
}

fn write_points(points: &[[u8; 32]], out: &mut Vec<u8>) {
    write_varint(points.len() as u64, out);
    for point in points {
        out.extend_from_slice(point);
    }
}

impl BulletproofPlusData {
    fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        Ok(Self {
            a: reader.array()?,
            a1: reader.array()?,
            b: reader.array()?,
            r1: reader.array()?,
            s1: reader.array()?,
            d1: reader.array()?,
            l: read_points(reader)?,
            r: read_points(reader)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        for field in [&self.a, &self.a1, &self.b, &self.r1, &self.s1, &self.d1] {
            out.extend_from_slice(field);
        }
        write_points(&self.l, out);
        write_points(&self.r, out);
    }

    /// Keys in signing-message order: `A, A1, B, r1, s1, d1, L.., R..`.
    #[must_use]
    pub fn key_vector(&self) -> Vec<[u8; 32]> {
        let mut keys = vec![self.a, self.a1, self.b, self.r1, self.s1, self.d1];
        keys.extend_from_slice(&self.l);
        keys.extend_from_slice(&self.r);
        keys
    }
}

impl BulletproofData {
    fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        Ok(Self {
            a: reader.array()?,
            s: reader.array()?,
            t1: reader.array()?,
            t2: reader.array()?,
            taux: reader.array()?,
            mu: reader.array()?,
            l: read_points(reader)?,
            r: read_points(reader)?,
            a_final: reader.array()?,
            b_final: reader.array()?,
            t: reader.array()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        for field in [&self.a, &self.s, &self.t1, &self.t2, &self.taux, &self.mu] {
            out.extend_from_slice(field);
        }
        write_points(&self.l, out);
        write_points(&self.r, out);
        for field in [&self.a_final, &self.b_final, &self.t] {
            out.extend_from_slice(field);
        }
    }

    /// Keys in signing-message order.
    #[must_use]
    pub fn key_vector(&self) -> Vec<[u8; 32]> {
        let mut keys = vec![self.a, self.s, self.t1, self.t2, self.taux, self.mu];
        keys.extend_from_slice(&self.l);
        keys.extend_from_slice(&self.r);
        keys.extend([self.a_final, self.b_final, self.t]);
        keys
    }
}

impl RangeProofs {
    /// Every proof key, concatenated in order.
    #[must_use]
    pub fn key_vector(&self) -> Vec<[u8; 32]> {
        match self {
            RangeProofs::Bulletproof(proofs) => {
                proofs.iter().flat_map(BulletproofData::key_vector).collect()
            }
            RangeProofs::BulletproofPlus(proofs) => proofs
                .iter()
                .flat_map(BulletproofPlusData::key_vector)
                .collect(),
        }
    }
}

impl RctPrunable {
    /// Read the prunable section.
    ///
    /// `ring_sizes` holds the ring length of every input. Raw sections
    /// consume the rest of the reader.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] or [`WireError::MalformedStream`].
    pub fn read(
        reader: &mut Reader<'_>,
        rct_type: RctType,
        ring_sizes: &[usize],
    ) -> WireResult<Self> {
        match rct_type {
            RctType::Null => Ok(RctPrunable::Null),
            RctType::Clsag | RctType::BulletproofPlus => {
                let count = reader.count(32)?;
                let proofs = if rct_type == RctType::BulletproofPlus {
                    RangeProofs::BulletproofPlus(
                        (0..count)
                            .map(|_| BulletproofPlusData::read(reader))
                            .collect::<WireResult<_>>()?,
                    )
                } else {
                    RangeProofs::Bulletproof(
                        (0..count)
                            .map(|_| BulletproofData::read(reader))
                            .collect::<WireResult<_>>()?,
                    )
                };

                let mut clsags = Vec::with_capacity(ring_sizes.len());
                for &ring_size in ring_sizes {
                    let s = (0..ring_size)
                        .map(|_| reader.array())
                        .collect::<WireResult<Vec<_>>>()?;
                    clsags.push(ClsagData {
                        s,
                        c1: reader.array()?,
                        d: reader.array()?,
                    });
                }

                let pseudo_outs = (0..ring_sizes.len())
                    .map(|_| reader.array())
                    .collect::<WireResult<Vec<_>>>()?;

                Ok(RctPrunable::Clsag {
                    proofs,
                    clsags,
                    pseudo_outs,
                })
            }
            _ => Ok(RctPrunable::Raw(reader.bytes(reader.remaining())?.to_vec())),
        }
    }

    /// Append the serialized section.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            RctPrunable::Null => {}
            RctPrunable::Clsag {
                proofs,
                clsags,
                pseudo_outs,
            } => {
                match proofs {
                    RangeProofs::Bulletproof(list) => {
                        write_varint(list.len() as u64, out);
                        for proof in list {
                            proof.write(out);
                        }
                    }
                    RangeProofs::BulletproofPlus(list) => {
                        write_varint(list.len() as u64, out);
                        for proof in list {
                            proof.write(out);
                        }
                    }
                }
                for clsag in clsags {
                    for s in &clsag.s {
                        out.extend_from_slice(s);
                    }
                    out.extend_from_slice(&clsag.c1);
                    out.extend_from_slice(&clsag.d);
                }
                for pseudo in pseudo_outs {
                    out.extend_from_slice(pseudo);
                }
            }
            RctPrunable::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }

    /// Keccak-256 of the serialized section; zero for [`RctPrunable::Null`].
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        match self {
            RctPrunable::Null => [0u8; 32],
            _ => {
                let mut out = Vec::new();
                self.write(&mut out);
                keccak256(&out)
            }
        }
    }

    /// Proof keys hashed into the CLSAG message; empty when unparsed.
    #[must_use]
    pub fn proof_key_vector(&self) -> Vec<[u8; 32]> {
        match self {
            RctPrunable::Clsag { proofs, .. } => proofs.key_vector(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bp_plus() -> BulletproofPlusData {
        BulletproofPlusData {
            a: [1; 32],
            a1: [2; 32],
            b: [3; 32],
            r1: [4; 32],
            s1: [5; 32],
            d1: [6; 32],
            l: vec![[7; 32]; 6],
            r: vec![[8; 32]; 6],
        }
    }

    #[test]
    fn test_null_base_is_one_byte() {
        let base = RctBase::null();
        assert_eq!(base.to_bytes(), vec![0]);
        let mut reader = Reader::new(&[0]);
        assert_eq!(RctBase::read(&mut reader, 1, 1).unwrap(), base);
    }

    #[test]
    fn test_compact_base_layout() {
        let base = RctBase {
            rct_type: RctType::BulletproofPlus,
            fee: 30_000_000,
            pseudo_outs: Vec::new(),
            ecdh_info: vec![EcdhInfo::Compact([9; 8]), EcdhInfo::Compact([10; 8])],
            out_pk: vec![[11; 32], [12; 32]],
        };
        let bytes = base.to_bytes();
        // type, 4-byte fee varint, 2 x 8, 2 x 32
        assert_eq!(bytes.len(), 1 + 4 + 16 + 64);
        let mut reader = Reader::new(&bytes);
        assert_eq!(RctBase::read(&mut reader, 1, 2).unwrap(), base);
        reader.finish().unwrap();
    }

    #[test]
    fn test_simple_base_keeps_pseudo_outs() {
        let base = RctBase {
            rct_type: RctType::Simple,
            fee: 1,
            pseudo_outs: vec![[3; 32], [4; 32]],
            ecdh_info: vec![EcdhInfo::Full {
                mask: [5; 32],
                amount: [6; 32],
            }],
            out_pk: vec![[7; 32]],
        };
        let bytes = base.to_bytes();
        let mut reader = Reader::new(&bytes);
        assert_eq!(RctBase::read(&mut reader, 2, 1).unwrap(), base);
        assert_eq!(base.ecdh_info[0].compact_amount(), None);
    }

    #[test]
    fn test_clsag_prunable_round_trip() {
        let prunable = RctPrunable::Clsag {
            proofs: RangeProofs::BulletproofPlus(vec![sample_bp_plus()]),
            clsags: vec![ClsagData {
                s: vec![[13; 32]; 3],
                c1: [14; 32],
                d: [15; 32],
            }],
            pseudo_outs: vec![[16; 32]],
        };
        let mut bytes = Vec::new();
        prunable.write(&mut bytes);
        let mut reader = Reader::new(&bytes);
        let parsed = RctPrunable::read(&mut reader, RctType::BulletproofPlus, &[3]).unwrap();
        reader.finish().unwrap();
        assert_eq!(parsed, prunable);
        assert_ne!(parsed.hash(), [0u8; 32]);
    }

    #[test]
    fn test_key_vector_order() {
        let keys = sample_bp_plus().key_vector();
        assert_eq!(keys.len(), 6 + 12);
        assert_eq!(keys[0], [1; 32]);
        assert_eq!(keys[5], [6; 32]);
        assert_eq!(keys[6], [7; 32]);
        assert_eq!(keys[17], [8; 32]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            RctType::from_byte(7),
            Err(WireError::MalformedStream(_))
        ));
    }

    #[test]
    fn test_truncated_clsag_reports_offset() {
        let mut bytes = Vec::new();
        write_varint(0, &mut bytes);
        bytes.extend_from_slice(&[0u8; 40]);
        let mut reader = Reader::new(&bytes);
        let err = RctPrunable::read(&mut reader, RctType::Clsag, &[2]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }
}
