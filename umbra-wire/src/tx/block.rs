//! Block header, block body and block id.

use umbra_types::{BlockHash, TxId};

use super::hash::{keccak256, tree_hash};
use super::reader::Reader;
use super::transaction::{Transaction, TxIn};
use super::varint::write_varint;
use crate::error::{WireError, WireResult};

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hard-fork version
    pub major_version: u8,
    /// Voting version
    pub minor_version: u8,
    /// Unix timestamp
    pub timestamp: u64,
    /// Id of the parent block
    pub prev_id: BlockHash,
    /// Proof-of-work nonce
    pub nonce: u32,
}

fn read_version(reader: &mut Reader<'_>) -> WireResult<u8> {
    let value = reader.varint()?;
    u8::try_from(value)
        .map_err(|_| WireError::MalformedStream(format!("block version {value} out of range")))
}

impl BlockHeader {
    /// Read a header.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] or [`WireError::MalformedStream`].
    pub fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        Ok(Self {
            major_version: read_version(reader)?,
            minor_version: read_version(reader)?,
            timestamp: reader.varint()?,
            prev_id: BlockHash::new(reader.array()?),
            nonce: reader.u32_le()?,
        })
    }

    /// Append the serialized header.
    pub fn write(&self, out: &mut Vec<u8>) {
        write_varint(u64::from(self.major_version), out);
        write_varint(u64::from(self.minor_version), out);
        write_varint(self.timestamp, out);
        out.extend_from_slice(self.prev_id.as_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
    }
}

/// Block with its coinbase and the ids of the transactions it includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Header
    pub header: BlockHeader,
    /// Coinbase transaction
    pub miner_tx: Transaction,
    /// Included transaction ids, excluding the coinbase
    pub tx_hashes: Vec<TxId>,
}

impl Block {
    /// Parse a block blob.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`], [`WireError::MalformedStream`] or
    /// [`WireError::Trailing`].
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        let mut reader = Reader::new(bytes);
        let header = BlockHeader::read(&mut reader)?;
        let miner_tx = Transaction::read(&mut reader)?;
        if !miner_tx.prefix.is_coinbase() {
            return Err(WireError::MalformedStream(
                "miner transaction lacks a coinbase input".into(),
            ));
        }
        let count = reader.count(32)?;
        let tx_hashes = (0..count)
            .map(|_| reader.array().map(TxId::new))
            .collect::<WireResult<Vec<_>>>()?;
        reader.finish()?;
        Ok(Self {
            header,
            miner_tx,
            tx_hashes,
        })
    }

    /// Serialized block.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.header.write(&mut out);
        self.miner_tx.write(&mut out);
        write_varint(self.tx_hashes.len() as u64, &mut out);
        for hash in &self.tx_hashes {
            out.extend_from_slice(hash.as_bytes());
        }
        out
    }

    /// Height recorded in the coinbase input.
    #[must_use]
    pub fn height(&self) -> Option<u64> {
        match self.miner_tx.prefix.inputs.first() {
            Some(TxIn::Gen { height }) => Some(*height),
            _ => None,
        }
    }

    /// Header, Merkle root over all transaction ids, transaction count.
    ///
    /// # Errors
    ///
    /// Propagates a failure to compute the coinbase id.
    pub fn hashing_blob(&self) -> WireResult<Vec<u8>> {
        let mut leaves = Vec::with_capacity(self.tx_hashes.len() + 1);
        leaves.push(self.miner_tx.id()?.to_bytes());
        leaves.extend(self.tx_hashes.iter().map(|h| h.to_bytes()));
        let root = tree_hash(&leaves)
            .ok_or_else(|| WireError::MalformedStream("empty transaction tree".into()))?;

        let mut blob = Vec::new();
        self.header.write(&mut blob);
        blob.extend_from_slice(&root);
        write_varint(leaves.len() as u64, &mut blob);
        Ok(blob)
    }

    /// Block id: Keccak-256 of the length-prefixed hashing blob.
    ///
    /// # Errors
    ///
    /// As [`Block::hashing_blob`].
    pub fn id(&self) -> WireResult<BlockHash> {
        let blob = self.hashing_blob()?;
        let mut prefixed = Vec::with_capacity(blob.len() + 2);
        write_varint(blob.len() as u64, &mut prefixed);
        prefixed.extend_from_slice(&blob);
        Ok(BlockHash::new(keccak256(&prefixed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::rct::{RctBase, RctPrunable};
    use crate::tx::transaction::{OutputTarget, TransactionPrefix, TxOut, TxSignatures};

    fn sample_block(tx_count: u8) -> Block {
        Block {
            header: BlockHeader {
                major_version: 16,
                minor_version: 16,
                timestamp: 1_700_000_000,
                prev_id: BlockHash::new([0x5a; 32]),
                nonce: 0xdead_beef,
            },
            miner_tx: Transaction {
                prefix: TransactionPrefix {
                    version: 2,
                    unlock_time: 3_000_060,
                    inputs: vec![TxIn::Gen { height: 3_000_000 }],
                    outputs: vec![TxOut {
                        amount: 600_000_000_000,
                        target: OutputTarget::TaggedKey {
                            key: [0x77; 32],
                            view_tag: 0x9c,
                        },
                    }],
                    extra: [&[0x01][..], &[0x44; 32]].concat(),
                },
                signatures: TxSignatures::Rct {
                    base: RctBase::null(),
                    prunable: Some(RctPrunable::Null),
                },
            },
            tx_hashes: (1..=tx_count).map(|n| TxId::new([n; 32])).collect(),
        }
    }

    #[test]
    fn test_block_round_trip() {
        let block = sample_block(3);
        let bytes = block.to_bytes();
        let parsed = Block::parse(&bytes).unwrap();
        assert_eq!(parsed, block);
        assert_eq!(parsed.height(), Some(3_000_000));
    }

    #[test]
    fn test_nonce_little_endian() {
        let bytes = sample_block(0).to_bytes();
        // 1 + 1 + 5 (timestamp) + 32, then the nonce
        assert_eq!(&bytes[39..43], &[0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn test_hashing_blob_layout() {
        let block = sample_block(2);
        let blob = block.hashing_blob().unwrap();
        let mut header = Vec::new();
        block.header.write(&mut header);
        assert!(blob.starts_with(&header));
        assert_eq!(blob.len(), header.len() + 32 + 1);
        assert_eq!(*blob.last().unwrap(), 3);
    }

    #[test]
    fn test_block_id_depends_on_transactions() {
        let a = sample_block(1).id().unwrap();
        let b = sample_block(2).id().unwrap();
        assert_ne!(a, b);
        assert_eq!(a, sample_block(1).id().unwrap());
    }

    #[test]
    fn test_rejects_non_coinbase_miner_tx() {
        let mut block = sample_block(0);
        block.miner_tx.prefix.inputs.clear();
        assert!(matches!(
            Block::parse(&block.to_bytes()),
            Err(WireError::MalformedStream(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample_block(0).to_bytes();
        bytes.push(0);
        assert_eq!(Block::parse(&bytes), Err(WireError::Trailing(1)));
    }
}
