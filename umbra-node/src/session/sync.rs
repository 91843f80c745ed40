//! Chain walking and block assembly.
//!
//! [`ChainSync`] decides which chain and object requests a session sends.
//! [`assemble_block`] turns one received block entry into a scanned
//! [`PendingBlock`].

use std::collections::VecDeque;

use tracing::info;
use umbra_types::{format_atomic, BlockHash, Network};
use umbra_wire::p2p::{
    BlockCompleteEntry, CoreSyncData, RequestChain, RequestGetObjects, ResponseChainEntry,
};
use umbra_wire::{Block, Transaction, WireError};

use crate::error::NodeResult;
use crate::pool::PendingBlock;
use crate::scanner::Scanner;

/// Block ids per object request.
pub const MAX_OBJECTS_PER_REQUEST: usize = 100;

/// Major version advertised for our tip.
pub const TOP_VERSION: u8 = 16;

const MAINNET_GENESIS: &str = "418015bb9ae982a1975da7d79277c2705727a56894ba0fb246adaabb1f4632e3";
const TESTNET_GENESIS: &str = "48ca7cd3c8de5b6a4d53d2861fbdaedca141553559f9be9520068053cda8430b";
const STAGENET_GENESIS: &str = "76ee3cc98646292206cd3e86f74d88b4dcc1d937088645e9b0cbca84b7ce74eb";

/// Id of the first block of `network`.
#[must_use]
pub fn genesis_id(network: Network) -> Option<BlockHash> {
    let hex = match network {
        Network::Mainnet => MAINNET_GENESIS,
        Network::Testnet => TESTNET_GENESIS,
        Network::Stagenet => STAGENET_GENESIS,
    };
    BlockHash::from_hex(hex).ok()
}

/// Next request the chain walk wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// Ask for the ids following our history
    Chain(RequestChain),
    /// Ask for block bodies
    Objects(RequestGetObjects),
}

/// Per-session chain walk.
#[derive(Debug, Clone)]
pub struct ChainSync {
    genesis: Option<BlockHash>,
    local_height: u64,
    last_known: BlockHash,
    peer_height: u64,
    queue: VecDeque<BlockHash>,
    in_flight: bool,
}

impl ChainSync {
    /// Start from the persisted `(height, tip)`.
    #[must_use]
    pub fn new(network: Network, local_height: u64, tip: BlockHash) -> Self {
        Self {
            genesis: genesis_id(network),
            local_height,
            last_known: tip,
            peer_height: 0,
            queue: VecDeque::new(),
            in_flight: false,
        }
    }

    /// Blocks we have walked past.
    #[must_use]
    pub fn local_height(&self) -> u64 {
        self.local_height
    }

    /// Height last advertised by the peer.
    #[must_use]
    pub fn peer_height(&self) -> u64 {
        self.peer_height
    }

    /// True while chain or object requests are outstanding.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Chain state to advertise in handshakes and timed syncs.
    #[must_use]
    pub fn core_sync(&self) -> CoreSyncData {
        let (height, top_id) = if self.last_known == BlockHash::ZERO {
            (1, self.genesis.unwrap_or(BlockHash::ZERO))
        } else {
            (self.local_height.max(1), self.last_known)
        };
        CoreSyncData {
            current_height: height,
            cumulative_difficulty: 0,
            top_id,
            top_version: TOP_VERSION,
            pruning_seed: 0,
        }
    }

    /// Sparse history: our tip, then genesis.
    fn history(&self) -> Vec<BlockHash> {
        let mut ids = Vec::with_capacity(2);
        if self.last_known != BlockHash::ZERO {
            ids.push(self.last_known);
        }
        if let Some(genesis) = self.genesis {
            if !ids.contains(&genesis) {
                ids.push(genesis);
            }
        }
        ids
    }

    fn chain_request(&mut self) -> Option<SyncRequest> {
        let block_ids = self.history();
        if block_ids.is_empty() {
            return None;
        }
        self.in_flight = true;
        Some(SyncRequest::Chain(RequestChain {
            block_ids,
            prune: false,
        }))
    }

    fn next_objects(&mut self) -> Option<SyncRequest> {
        if self.queue.is_empty() {
            return None;
        }
        let take = self.queue.len().min(MAX_OBJECTS_PER_REQUEST);
        let blocks: Vec<BlockHash> = self.queue.drain(..take).collect();
        self.in_flight = true;
        Some(SyncRequest::Objects(RequestGetObjects {
            blocks,
            prune: false,
        }))
    }

    /// Record the peer's advertised height without starting a walk.
    pub fn note_peer_height(&mut self, peer_height: u64) {
        self.peer_height = self.peer_height.max(peer_height);
    }

    /// Record the peer's advertised height; start walking if it is ahead.
    pub fn observe_peer(&mut self, peer_height: u64) -> Option<SyncRequest> {
        self.note_peer_height(peer_height);
        if self.in_flight || self.peer_height <= self.local_height {
            return None;
        }
        self.chain_request()
    }

    /// False for heights further past the known chain than one object
    /// batch; such blocks are dropped rather than walked.
    #[must_use]
    pub fn plausible_height(&self, height: u64) -> bool {
        let known = self.peer_height.max(self.local_height);
        height <= known.saturating_add(MAX_OBJECTS_PER_REQUEST as u64)
    }

    /// Queue the ids at or above our height and ask for the first batch.
    pub fn on_chain_entry(&mut self, entry: &ResponseChainEntry) -> Option<SyncRequest> {
        self.peer_height = self.peer_height.max(entry.total_height);
        let Some(last) = entry.m_block_ids.last() else {
            self.in_flight = false;
            return None;
        };

        let skip = self.local_height.saturating_sub(entry.start_height);
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        self.queue.extend(entry.m_block_ids.iter().skip(skip).copied());
        self.last_known = *last;

        match self.next_objects() {
            Some(request) => Some(request),
            None => {
                let tip = entry
                    .start_height
                    .saturating_add(entry.m_block_ids.len() as u64);
                self.local_height = self.local_height.max(tip);
                if self.local_height < self.peer_height {
                    self.chain_request()
                } else {
                    self.in_flight = false;
                    None
                }
            }
        }
    }

    /// Blocks up to `highest` arrived; continue the walk.
    pub fn on_objects(&mut self, highest: Option<u64>) -> Option<SyncRequest> {
        if let Some(height) = highest {
            self.local_height = self.local_height.max(height.saturating_add(1));
        }
        if let Some(request) = self.next_objects() {
            return Some(request);
        }
        if self.local_height < self.peer_height {
            return self.chain_request();
        }
        self.in_flight = false;
        None
    }

    /// A block was pushed by the peer outside the walk.
    pub fn on_block(&mut self, height: u64, id: BlockHash) -> Option<SyncRequest> {
        self.peer_height = self.peer_height.max(height.saturating_add(1));
        if self.in_flight {
            return None;
        }
        if height == self.local_height {
            self.local_height = height.saturating_add(1);
            self.last_known = id;
            None
        } else if height > self.local_height {
            self.chain_request()
        } else {
            None
        }
    }
}

/// Parse, hash and scan one block entry.
///
/// # Errors
///
/// [`crate::error::NodeError::Codec`] for a malformed block or transaction blob.
pub fn assemble_block(
    entry: &BlockCompleteEntry,
    scanner: Option<&Scanner>,
) -> NodeResult<PendingBlock> {
    let block = Block::parse(&entry.block)?;
    let id = block.id()?;
    let height = block
        .height()
        .ok_or_else(|| WireError::MalformedStream("block without coinbase height".into()))?;
    let transactions = entry
        .txs
        .iter()
        .map(|blob| Transaction::parse(blob))
        .collect::<Result<Vec<_>, _>>()?;

    let mut owned = Vec::new();
    if let Some(scanner) = scanner {
        for tx in std::iter::once(&block.miner_tx).chain(transactions.iter()) {
            owned.extend(scanner.scan_transaction(tx).outputs);
        }
    }

    let pending = PendingBlock {
        id,
        height,
        block,
        transactions,
        owned,
    };
    if !pending.owned.is_empty() {
        info!(
            height,
            block = %id,
            outputs = pending.owned.len(),
            received = %format_atomic(pending.confirmed_total()),
            "[SCAN] Found owned outputs"
        );
    }
    Ok(pending)
}
