//! Pending-block pool
//!
//! Session readers insert parsed and scanned blocks; the database writer
//! drains them in height order. Both sides hold the lock only long enough
//! to move entries in or out.

use std::collections::HashMap;

use tokio::sync::{Mutex, Notify};
use umbra_types::BlockHash;
use umbra_wire::{Block, Transaction};

use crate::scanner::OwnedOutput;

/// A block waiting to be persisted
#[derive(Debug, Clone)]
pub struct PendingBlock {
    /// Block id
    pub id: BlockHash,
    /// Height from the miner transaction
    pub height: u64,
    /// Parsed block
    pub block: Block,
    /// Transactions that arrived with the block, miner transaction excluded
    pub transactions: Vec<Transaction>,
    /// Outputs paying the scanned keys, across all transactions
    pub owned: Vec<OwnedOutput>,
}

impl PendingBlock {
    /// Sum of confirmed owned amounts in this block.
    #[must_use]
    pub fn confirmed_total(&self) -> u64 {
        self.owned
            .iter()
            .filter(|o| o.is_confirmed())
            .filter_map(|o| o.amount)
            .fold(0u64, u64::saturating_add)
    }
}

/// Map of block id to pending block
#[derive(Debug, Default)]
pub struct BlockPool {
    blocks: Mutex<HashMap<BlockHash, PendingBlock>>,
    arrived: Notify,
}

impl BlockPool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block; returns `false` if it was already pending.
    pub async fn insert(&self, block: PendingBlock) -> bool {
        let inserted = {
            let mut blocks = self.blocks.lock().await;
            if blocks.contains_key(&block.id) {
                false
            } else {
                blocks.insert(block.id, block);
                true
            }
        };
        if inserted {
            self.arrived.notify_one();
        }
        inserted
    }

    /// Take every pending block, lowest height first.
    pub async fn drain_ordered(&self) -> Vec<PendingBlock> {
        let mut drained: Vec<PendingBlock> = {
            let mut blocks = self.blocks.lock().await;
            blocks.drain().map(|(_, block)| block).collect()
        };
        drained.sort_by_key(|block| block.height);
        drained
    }

    /// Wait until a block has been inserted since the last wake-up.
    pub async fn wait(&self) {
        self.arrived.notified().await;
    }

    /// Number of pending blocks.
    pub async fn len(&self) -> usize {
        self.blocks.lock().await.len()
    }

    /// True if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.blocks.lock().await.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use umbra_wire::tx::{OutputTarget, RctBase, TransactionPrefix, TxIn, TxOut, TxSignatures};
    use umbra_wire::BlockHeader;

    pub(crate) fn coinbase_block(height: u64) -> Block {
        Block {
            header: BlockHeader {
                major_version: 16,
                minor_version: 16,
                timestamp: 1_700_000_000 + height,
                prev_id: BlockHash::new([height as u8; 32]),
                nonce: 0,
            },
            miner_tx: Transaction {
                prefix: TransactionPrefix {
                    version: 2,
                    unlock_time: height + 60,
                    inputs: vec![TxIn::Gen { height }],
                    outputs: vec![TxOut {
                        amount: 600_000_000_000,
                        target: OutputTarget::TaggedKey {
                            key: [9; 32],
                            view_tag: 0,
                        },
                    }],
                    extra: Vec::new(),
                },
                signatures: TxSignatures::Rct {
                    base: RctBase::null(),
                    prunable: None,
                },
            },
            tx_hashes: Vec::new(),
        }
    }

    pub(crate) fn pending(height: u64) -> PendingBlock {
        let block = coinbase_block(height);
        PendingBlock {
            id: block.id().unwrap(),
            height,
            block,
            transactions: Vec::new(),
            owned: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_deduplicates() {
        let pool = BlockPool::new();
        assert!(pool.insert(pending(10)).await);
        assert!(!pool.insert(pending(10)).await);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_drain_in_height_order() {
        let pool = BlockPool::new();
        for height in [12, 10, 11] {
            pool.insert(pending(height)).await;
        }
        let drained = pool.drain_ordered().await;
        let heights: Vec<u64> = drained.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![10, 11, 12]);
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_insert() {
        let pool = std::sync::Arc::new(BlockPool::new());
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.wait().await })
        };
        pool.insert(pending(1)).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
