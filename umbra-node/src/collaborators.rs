//! Collaborator interfaces
//!
//! The core reports through a [`Notifier`] and persists through a
//! [`Database`]. Both are traits so the binary, tests and any embedding
//! service can supply their own sinks.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use umbra_types::{format_atomic, BlockHash, Network};

use crate::error::{NodeError, NodeResult};
use crate::pool::PendingBlock;
use crate::scanner::OwnedOutput;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotifyLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something to look at
    Warn,
    /// Something failed
    Error,
}

/// Side-effect-only sink for human-readable events
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Never fails.
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Forwards notifications to `tracing` at the mapped level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        match level {
            NotifyLevel::Debug => debug!(target: "umbra_node::notify", "{}", message),
            NotifyLevel::Info => info!(target: "umbra_node::notify", "{}", message),
            NotifyLevel::Warn => warn!(target: "umbra_node::notify", "{}", message),
            NotifyLevel::Error => error!(target: "umbra_node::notify", "{}", message),
        }
    }
}

/// Persistence the core depends on
#[async_trait]
pub trait Database: Send + Sync {
    /// Known peer addresses for `network`.
    async fn get_node_addrs(&self, network: Network) -> NodeResult<Vec<SocketAddr>>;

    /// Height and id of the highest persisted block.
    async fn get_chain_height(&self, network: Network) -> NodeResult<(u64, BlockHash)>;

    /// Persist one block and the funds found in it.
    async fn process_block(&self, network: Network, block: &PendingBlock) -> NodeResult<()>;
}

#[derive(Debug, Default)]
struct ChainState {
    height: u64,
    tip: BlockHash,
    node_addrs: Vec<SocketAddr>,
    owned: Vec<OwnedOutput>,
}

/// In-process [`Database`] used by the binary and tests
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    chains: RwLock<HashMap<Network, ChainState>>,
}

impl MemoryDatabase {
    /// Empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record peer addresses for `network`, skipping duplicates.
    pub async fn add_node_addrs(&self, network: Network, addrs: &[SocketAddr]) {
        let mut chains = self.chains.write().await;
        let state = chains.entry(network).or_default();
        for addr in addrs {
            if !state.node_addrs.contains(addr) {
                state.node_addrs.push(*addr);
            }
        }
    }

    /// Owned outputs persisted so far.
    pub async fn owned_outputs(&self, network: Network) -> Vec<OwnedOutput> {
        self.chains
            .read()
            .await
            .get(&network)
            .map(|state| state.owned.clone())
            .unwrap_or_default()
    }

    /// Sum of confirmed owned amounts.
    pub async fn confirmed_balance(&self, network: Network) -> u64 {
        self.chains
            .read()
            .await
            .get(&network)
            .map(|state| {
                state
                    .owned
                    .iter()
                    .filter(|o| o.is_confirmed())
                    .filter_map(|o| o.amount)
                    .fold(0u64, u64::saturating_add)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_node_addrs(&self, network: Network) -> NodeResult<Vec<SocketAddr>> {
        Ok(self
            .chains
            .read()
            .await
            .get(&network)
            .map(|state| state.node_addrs.clone())
            .unwrap_or_default())
    }

    async fn get_chain_height(&self, network: Network) -> NodeResult<(u64, BlockHash)> {
        Ok(self
            .chains
            .read()
            .await
            .get(&network)
            .map_or((0, BlockHash::ZERO), |state| (state.height, state.tip)))
    }

    async fn process_block(&self, network: Network, block: &PendingBlock) -> NodeResult<()> {
        let mut chains = self.chains.write().await;
        let state = chains.entry(network).or_default();

        if block.height.saturating_add(1) < state.height {
            return Err(NodeError::InvalidState(format!(
                "block {} at height {} is below persisted height {}",
                block.id, block.height, state.height
            )));
        }

        for owned in &block.owned {
            let duplicate = state
                .owned
                .iter()
                .any(|o| o.one_time_key == owned.one_time_key);
            if !duplicate {
                state.owned.push(owned.clone());
            }
        }

        let next = block.height.saturating_add(1);
        if next > state.height {
            state.height = next;
            state.tip = block.id;
        }

        if !block.owned.is_empty() {
            info!(
                height = block.height,
                block = %block.id,
                received = %format_atomic(block.confirmed_total()),
                "[DB] Persisted block with owned outputs"
            );
        }
        Ok(())
    }
}
