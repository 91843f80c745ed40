//! Chain-sync notifications: blocks, transactions, chain and object requests.

use umbra_types::BlockHash;

use super::admin::{join_difficulty, split_difficulty};
use super::Message;
use crate::error::WireResult;
use crate::levin::Command;
use crate::storage::{Array, Section, Value};

/// A block blob with the blobs of the transactions it includes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockCompleteEntry {
    /// Serialized block
    pub block: Vec<u8>,
    /// Serialized transactions, in block order
    pub txs: Vec<Vec<u8>>,
    /// Transactions are pruned
    pub pruned: bool,
}

impl BlockCompleteEntry {
    /// Encode as an entry tree.
    #[must_use]
    pub fn to_section(&self) -> Section {
        let mut section = Section::new().with("block", Value::String(self.block.clone()));
        if self.pruned {
            section.insert("pruned", Value::Bool(true));
        }
        if !self.txs.is_empty() {
            section.insert("txs", Value::Array(Array::String(self.txs.clone())));
        }
        section
    }

    /// Decode from an entry tree.
    ///
    /// # Errors
    ///
    /// Missing or mistyped fields.
    pub fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            block: section.get_bytes("block")?.to_vec(),
            txs: section.get_strings("txs")?.to_vec(),
            pruned: section.optional("pruned", Section::get_bool)?.unwrap_or(false),
        })
    }
}

fn hashes_to_value(hashes: &[BlockHash]) -> Value {
    Value::String(hashes.iter().flat_map(|h| h.to_bytes()).collect())
}

fn hashes_from_section(section: &Section, name: &str) -> WireResult<Vec<BlockHash>> {
    match section.get(name) {
        None => Ok(Vec::new()),
        Some(_) => Ok(section
            .get_hash_blob(name)?
            .into_iter()
            .map(BlockHash::new)
            .collect()),
    }
}

/// New block notification (2001).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    /// Block and its transactions
    pub b: BlockCompleteEntry,
    /// Sender's chain height
    pub current_blockchain_height: u64,
}

impl Message for NewBlock {
    const COMMAND: Command = Command::NewBlock;

    fn to_section(&self) -> Section {
        Section::new()
            .with("b", Value::Section(self.b.to_section()))
            .with(
                "current_blockchain_height",
                Value::U64(self.current_blockchain_height),
            )
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            b: BlockCompleteEntry::from_section(section.get_section("b")?)?,
            current_blockchain_height: section.get_u64("current_blockchain_height")?,
        })
    }
}

/// Fluffy block notification (2010): the block with only the
/// transactions the receiver is assumed not to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFluffyBlock {
    /// Block and the transactions sent along
    pub b: BlockCompleteEntry,
    /// Sender's chain height
    pub current_blockchain_height: u64,
}

impl Message for NewFluffyBlock {
    const COMMAND: Command = Command::NewFluffyBlock;

    fn to_section(&self) -> Section {
        Section::new()
            .with("b", Value::Section(self.b.to_section()))
            .with(
                "current_blockchain_height",
                Value::U64(self.current_blockchain_height),
            )
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            b: BlockCompleteEntry::from_section(section.get_section("b")?)?,
            current_blockchain_height: section.get_u64("current_blockchain_height")?,
        })
    }
}

/// Relayed transactions (2002).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactions {
    /// Transaction blobs
    pub txs: Vec<Vec<u8>>,
    /// Dandelion++ fluff phase
    pub dandelionpp_fluff: bool,
}

impl Message for NewTransactions {
    const COMMAND: Command = Command::NewTransactions;

    fn to_section(&self) -> Section {
        Section::new()
            .with("txs", Value::Array(Array::String(self.txs.clone())))
            .with("dandelionpp_fluff", Value::Bool(self.dandelionpp_fluff))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            txs: section.get_strings("txs")?.to_vec(),
            dandelionpp_fluff: section
                .optional("dandelionpp_fluff", Section::get_bool)?
                .unwrap_or(true),
        })
    }
}

/// Chain request (2006): sparse list of known block ids, newest first,
/// ending with genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChain {
    /// Known block ids
    pub block_ids: Vec<BlockHash>,
    /// Ask for pruned data
    pub prune: bool,
}

impl Message for RequestChain {
    const COMMAND: Command = Command::RequestChain;

    fn to_section(&self) -> Section {
        Section::new()
            .with("block_ids", hashes_to_value(&self.block_ids))
            .with("prune", Value::Bool(self.prune))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            block_ids: hashes_from_section(section, "block_ids")?,
            prune: section.optional("prune", Section::get_bool)?.unwrap_or(false),
        })
    }
}

/// Chain response (2007): ids following the common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseChainEntry {
    /// Height of the first id
    pub start_height: u64,
    /// Responder's chain height
    pub total_height: u64,
    /// Responder's total chain work
    pub cumulative_difficulty: u128,
    /// Block ids starting at `start_height`
    pub m_block_ids: Vec<BlockHash>,
    /// Block weights, parallel to `m_block_ids` when present
    pub m_block_weights: Vec<u64>,
    /// Blob of the first block, when sent
    pub first_block: Vec<u8>,
}

impl Message for ResponseChainEntry {
    const COMMAND: Command = Command::ResponseChainEntry;

    fn to_section(&self) -> Section {
        let (low, high) = split_difficulty(self.cumulative_difficulty);
        let mut section = Section::new()
            .with("start_height", Value::U64(self.start_height))
            .with("total_height", Value::U64(self.total_height))
            .with("cumulative_difficulty", Value::U64(low))
            .with("cumulative_difficulty_top64", Value::U64(high))
            .with("m_block_ids", hashes_to_value(&self.m_block_ids));
        if !self.m_block_weights.is_empty() {
            section.insert(
                "m_block_weights",
                Value::Array(Array::U64(self.m_block_weights.clone())),
            );
        }
        if !self.first_block.is_empty() {
            section.insert("first_block", Value::String(self.first_block.clone()));
        }
        section
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        let low = section.get_u64("cumulative_difficulty")?;
        let high = section
            .optional("cumulative_difficulty_top64", Section::get_u64)?
            .unwrap_or(0);
        Ok(Self {
            start_height: section.get_u64("start_height")?,
            total_height: section.get_u64("total_height")?,
            cumulative_difficulty: join_difficulty(low, high),
            m_block_ids: hashes_from_section(section, "m_block_ids")?,
            m_block_weights: section.get_u64s("m_block_weights")?.to_vec(),
            first_block: section
                .optional("first_block", Section::get_bytes)?
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
        })
    }
}

/// Object request (2008).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGetObjects {
    /// Ids of the wanted blocks
    pub blocks: Vec<BlockHash>,
    /// Ask for pruned data
    pub prune: bool,
}

impl Message for RequestGetObjects {
    const COMMAND: Command = Command::RequestGetObjects;

    fn to_section(&self) -> Section {
        Section::new()
            .with("blocks", hashes_to_value(&self.blocks))
            .with("prune", Value::Bool(self.prune))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            blocks: hashes_from_section(section, "blocks")?,
            prune: section.optional("prune", Section::get_bool)?.unwrap_or(false),
        })
    }
}

/// Object response (2009).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseGetObjects {
    /// Requested blocks with their transactions
    pub blocks: Vec<BlockCompleteEntry>,
    /// Ids the responder did not have
    pub missed_ids: Vec<BlockHash>,
    /// Responder's chain height
    pub current_blockchain_height: u64,
}

impl Message for ResponseGetObjects {
    const COMMAND: Command = Command::ResponseGetObjects;

    fn to_section(&self) -> Section {
        let mut section = Section::new().with(
            "blocks",
            Value::Array(Array::Section(
                self.blocks.iter().map(BlockCompleteEntry::to_section).collect(),
            )),
        );
        if !self.missed_ids.is_empty() {
            section.insert("missed_ids", hashes_to_value(&self.missed_ids));
        }
        section.with(
            "current_blockchain_height",
            Value::U64(self.current_blockchain_height),
        )
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            blocks: section
                .get_sections("blocks")?
                .iter()
                .map(BlockCompleteEntry::from_section)
                .collect::<WireResult<_>>()?,
            missed_ids: hashes_from_section(section, "missed_ids")?,
            current_blockchain_height: section.get_u64("current_blockchain_height")?,
        })
    }
}

/// Request for transactions of a fluffy block the receiver lacks (2011).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFluffyMissingTx {
    /// Block the transactions belong to
    pub block_hash: BlockHash,
    /// Requester's chain height
    pub current_blockchain_height: u64,
    /// Positions within the block's transaction list
    pub missing_tx_indices: Vec<u64>,
}

impl Message for RequestFluffyMissingTx {
    const COMMAND: Command = Command::RequestFluffyMissingTx;

    fn to_section(&self) -> Section {
        Section::new()
            .with("block_hash", Value::String(self.block_hash.as_bytes().to_vec()))
            .with(
                "current_blockchain_height",
                Value::U64(self.current_blockchain_height),
            )
            .with(
                "missing_tx_indices",
                Value::Array(Array::U64(self.missing_tx_indices.clone())),
            )
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            block_hash: BlockHash::new(section.get_array_bytes("block_hash")?),
            current_blockchain_height: section.get_u64("current_blockchain_height")?,
            missing_tx_indices: section.get_u64s("missing_tx_indices")?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;

    #[test]
    fn test_fluffy_block_round_trip() {
        let message = NewFluffyBlock {
            b: BlockCompleteEntry {
                block: vec![1, 2, 3],
                txs: vec![vec![4, 5], vec![6]],
                pruned: false,
            },
            current_blockchain_height: 3_000_001,
        };
        let payload = message.to_payload().unwrap();
        assert_eq!(NewFluffyBlock::from_payload(&payload).unwrap(), message);
    }

    #[test]
    fn test_chain_entry_round_trip() {
        let message = ResponseChainEntry {
            start_height: 100,
            total_height: 200,
            cumulative_difficulty: 1 << 70,
            m_block_ids: vec![BlockHash::new([1; 32]), BlockHash::new([2; 32])],
            m_block_weights: vec![300_000, 300_001],
            first_block: vec![0xab; 10],
        };
        let payload = message.to_payload().unwrap();
        assert_eq!(ResponseChainEntry::from_payload(&payload).unwrap(), message);
    }

    #[test]
    fn test_get_objects_round_trip() {
        let request = RequestGetObjects {
            blocks: vec![BlockHash::new([7; 32])],
            prune: true,
        };
        assert_eq!(
            RequestGetObjects::from_payload(&request.to_payload().unwrap()).unwrap(),
            request
        );

        let response = ResponseGetObjects {
            blocks: vec![BlockCompleteEntry {
                block: vec![9; 4],
                txs: Vec::new(),
                pruned: false,
            }],
            missed_ids: vec![BlockHash::new([8; 32])],
            current_blockchain_height: 5,
        };
        assert_eq!(
            ResponseGetObjects::from_payload(&response.to_payload().unwrap()).unwrap(),
            response
        );
    }

    #[test]
    fn test_hash_blob_must_be_whole_hashes() {
        let section = Section::new()
            .with("block_ids", Value::String(vec![0; 33]))
            .with("prune", Value::Bool(false));
        assert!(matches!(
            RequestChain::from_section(&section),
            Err(WireError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_tx_request_round_trip() {
        let message = RequestFluffyMissingTx {
            block_hash: BlockHash::new([3; 32]),
            current_blockchain_height: 10,
            missing_tx_indices: vec![0, 4],
        };
        assert_eq!(
            RequestFluffyMissingTx::from_payload(&message.to_payload().unwrap()).unwrap(),
            message
        );
    }
}
