//! Routing of inbound frames for a Ready session.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use umbra_types::{format_atomic, BlockHash, TxId};
use umbra_wire::p2p::{
    BlockCompleteEntry, NewFluffyBlock, NewTransactions, PingResponse, RequestFluffyMissingTx,
    ResponseGetObjects, TimedSyncRequest, TimedSyncResponse, PING_OK,
};
use umbra_wire::{Block, Command, Message, Notification, Transaction};

use super::connection::{request_frame, response_frame, Frame};
use super::sync::{assemble_block, ChainSync, SyncRequest};
use super::SessionContext;
use crate::collaborators::NotifyLevel;
use crate::error::{NodeError, NodeResult};
use crate::pool::PendingBlock;

/// Consecutive failure return codes tolerated before the session closes.
pub const MAX_PROTOCOL_FAILURES: u32 = 3;

/// Fluffy blocks held while their missing transactions are requested.
pub const MAX_PENDING_FLUFFY: usize = 8;

/// Partial fluffy blocks, oldest evicted first.
#[derive(Debug, Default)]
pub(crate) struct FluffyCache {
    blobs: HashMap<BlockHash, Vec<Vec<u8>>>,
    order: VecDeque<BlockHash>,
}

impl FluffyCache {
    /// Remove and return the transactions held for `id`.
    pub(crate) fn take(&mut self, id: &BlockHash) -> Vec<Vec<u8>> {
        match self.blobs.remove(id) {
            Some(blobs) => {
                self.order.retain(|held| held != id);
                blobs
            }
            None => Vec::new(),
        }
    }

    /// Hold `blobs` for `id`, evicting the oldest block when full.
    pub(crate) fn stash(&mut self, id: BlockHash, blobs: Vec<Vec<u8>>) {
        if self.blobs.insert(id, blobs).is_some() {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > MAX_PENDING_FLUFFY {
            if let Some(oldest) = self.order.pop_front() {
                debug!(block = %oldest, "[SESSION] Evicting unanswered fluffy block");
                self.blobs.remove(&oldest);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.blobs.len()
    }
}

/// Per-session dispatch state.
pub(crate) struct Dispatcher {
    ctx: Arc<SessionContext>,
    peer: SocketAddr,
    sync: ChainSync,
    outbound: mpsc::Sender<Vec<u8>>,
    protocol_failures: u32,
    fluffy_partial: FluffyCache,
    blocks_received: u64,
}

impl Dispatcher {
    pub(crate) fn new(
        ctx: Arc<SessionContext>,
        peer: SocketAddr,
        sync: ChainSync,
        outbound: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            ctx,
            peer,
            sync,
            outbound,
            protocol_failures: 0,
            fluffy_partial: FluffyCache::default(),
            blocks_received: 0,
        }
    }

    pub(crate) fn blocks_received(&self) -> u64 {
        self.blocks_received
    }

    async fn enqueue(&self, bytes: Vec<u8>) -> NodeResult<()> {
        self.outbound.send(bytes).await.map_err(|_| NodeError::Closed)
    }

    async fn send<M: Message>(&self, message: &M) -> NodeResult<()> {
        self.enqueue(request_frame(message)?).await
    }

    async fn respond<M: Message>(&self, message: &M) -> NodeResult<()> {
        self.enqueue(response_frame(message)?).await
    }

    async fn send_sync(&self, request: Option<SyncRequest>) -> NodeResult<()> {
        match request {
            Some(SyncRequest::Chain(request)) => {
                debug!(
                    peer = %self.peer,
                    local_height = self.sync.local_height(),
                    peer_height = self.sync.peer_height(),
                    "[SESSION][SYNC] Requesting chain"
                );
                self.send(&request).await
            }
            Some(SyncRequest::Objects(request)) => {
                debug!(
                    peer = %self.peer,
                    count = request.blocks.len(),
                    "[SESSION][SYNC] Requesting blocks"
                );
                self.send(&request).await
            }
            None => Ok(()),
        }
    }

    /// Kick off the chain walk after the handshake.
    pub(crate) async fn start(&mut self, peer_height: u64) -> NodeResult<()> {
        let request = self.sync.observe_peer(peer_height);
        self.send_sync(request).await
    }

    /// Emit one timed-sync request.
    pub(crate) async fn timed_sync(&self) -> NodeResult<()> {
        debug!(peer = %self.peer, "[SESSION] Timed sync");
        self.send(&TimedSyncRequest {
            payload_data: self.sync.core_sync(),
        })
        .await
    }

    /// Handle one inbound frame. Only session-fatal errors are returned.
    pub(crate) async fn handle(&mut self, frame: Frame) -> NodeResult<()> {
        let header = frame.header;
        if header.is_response() {
            return self.handle_response(header.command, header.return_code, &frame.payload).await;
        }

        match header.command {
            Command::TimedSync => {
                self.respond(&TimedSyncResponse {
                    payload_data: self.sync.core_sync(),
                    local_peerlist_new: Vec::new(),
                })
                .await
            }
            Command::Ping => {
                self.respond(&PingResponse {
                    status: PING_OK.to_string(),
                    peer_id: self.ctx.peer_id,
                })
                .await
            }
            Command::Handshake => {
                warn!(peer = %self.peer, "[SESSION] Ignoring handshake request on a ready session");
                Ok(())
            }
            command => match Notification::decode(command, &frame.payload) {
                Ok(Some(notification)) => self.handle_notification(notification).await,
                Ok(None) => {
                    debug!(peer = %self.peer, command = command.id(), "[SESSION] Ignoring unknown command");
                    Ok(())
                }
                Err(e) => {
                    warn!(peer = %self.peer, command = command.id(), "[SESSION] Dropping malformed message: {}", e);
                    Ok(())
                }
            },
        }
    }

    async fn handle_response(
        &mut self,
        command: Command,
        return_code: i32,
        payload: &[u8],
    ) -> NodeResult<()> {
        if return_code < 0 {
            self.protocol_failures += 1;
            let err = NodeError::Protocol {
                command: command.id(),
                return_code,
            };
            warn!(peer = %self.peer, failures = self.protocol_failures, "[SESSION] {}", err);
            if self.protocol_failures >= MAX_PROTOCOL_FAILURES {
                return Err(err);
            }
            return Ok(());
        }
        self.protocol_failures = 0;

        match command {
            Command::TimedSync => match TimedSyncResponse::from_payload(payload) {
                Ok(response) => {
                    self.ctx.nodes.learn(&response.local_peerlist_new).await;
                    let request = self.sync.observe_peer(response.payload_data.current_height);
                    self.send_sync(request).await
                }
                Err(e) => {
                    warn!(peer = %self.peer, "[SESSION] Dropping malformed timed-sync response: {}", e);
                    Ok(())
                }
            },
            Command::Ping => {
                debug!(peer = %self.peer, "[SESSION] Pong");
                Ok(())
            }
            other => {
                debug!(peer = %self.peer, command = other.id(), "[SESSION] Ignoring unsolicited response");
                Ok(())
            }
        }
    }

    async fn handle_notification(&mut self, notification: Notification) -> NodeResult<()> {
        match notification {
            Notification::NewBlock(message) => {
                self.on_pushed_block(message.b, message.current_blockchain_height)
                    .await
            }
            Notification::NewFluffyBlock(message) => self.on_fluffy_block(message).await,
            Notification::NewTransactions(message) => {
                self.on_transactions(&message);
                Ok(())
            }
            Notification::ResponseChainEntry(entry) => {
                debug!(
                    peer = %self.peer,
                    start_height = entry.start_height,
                    count = entry.m_block_ids.len(),
                    "[SESSION][SYNC] Chain entry"
                );
                let request = self.sync.on_chain_entry(&entry);
                self.send_sync(request).await
            }
            Notification::ResponseGetObjects(response) => self.on_objects(response).await,
            Notification::RequestChain(_)
            | Notification::RequestGetObjects(_)
            | Notification::RequestFluffyMissingTx(_) => {
                debug!(peer = %self.peer, "[SESSION] No chain to serve, ignoring request");
                Ok(())
            }
        }
    }

    async fn on_pushed_block(&mut self, entry: BlockCompleteEntry, peer_height: u64) -> NodeResult<()> {
        self.sync.note_peer_height(peer_height);
        let mut assembled = self.assemble(vec![entry]).await?;
        let Some(block) = assembled.pop() else {
            return Ok(());
        };
        let (height, id) = (block.height, block.id);
        self.accept(block).await;
        let request = match self.sync.on_block(height, id) {
            Some(request) => Some(request),
            None => self.sync.observe_peer(peer_height),
        };
        self.send_sync(request).await
    }

    async fn on_fluffy_block(&mut self, message: NewFluffyBlock) -> NodeResult<()> {
        let block = match Block::parse(&message.b.block) {
            Ok(block) => block,
            Err(e) => {
                warn!(peer = %self.peer, "[SESSION] Dropping malformed fluffy block: {}", e);
                return Ok(());
            }
        };
        let block_id = match block.id() {
            Ok(id) => id,
            Err(e) => {
                warn!(peer = %self.peer, "[SESSION] Fluffy block has no id: {}", e);
                return Ok(());
            }
        };

        let mut blobs = self.fluffy_partial.take(&block_id);
        blobs.extend(message.b.txs);
        let mut by_id: HashMap<TxId, Vec<u8>> = HashMap::new();
        for blob in blobs {
            if let Ok(id) = Transaction::parse(&blob).and_then(|tx| tx.id()) {
                by_id.insert(id, blob);
            }
        }

        let missing: Vec<u64> = block
            .tx_hashes
            .iter()
            .enumerate()
            .filter(|(_, id)| !by_id.contains_key(*id))
            .map(|(index, _)| index as u64)
            .collect();
        if !missing.is_empty() {
            debug!(
                peer = %self.peer,
                block = %block_id,
                missing = missing.len(),
                "[SESSION] Requesting fluffy block transactions"
            );
            self.fluffy_partial
                .stash(block_id, by_id.into_values().collect());
            return self
                .send(&RequestFluffyMissingTx {
                    block_hash: block_id,
                    current_blockchain_height: self.sync.local_height(),
                    missing_tx_indices: missing,
                })
                .await;
        }

        let txs = block
            .tx_hashes
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        let entry = BlockCompleteEntry {
            block: message.b.block,
            txs,
            pruned: false,
        };
        self.on_pushed_block(entry, message.current_blockchain_height)
            .await
    }

    fn on_transactions(&self, message: &NewTransactions) {
        let Some(scanner) = self.ctx.scanner.as_ref() else {
            return;
        };
        for blob in &message.txs {
            let tx = match Transaction::parse(blob) {
                Ok(tx) => tx,
                Err(e) => {
                    debug!(peer = %self.peer, "[SESSION] Skipping malformed pool transaction: {}", e);
                    continue;
                }
            };
            let outcome = scanner.scan_transaction(&tx);
            if !outcome.is_empty() {
                let tx_id = tx.id().map(|id| id.to_hex()).unwrap_or_default();
                self.ctx.notifier.notify(
                    NotifyLevel::Info,
                    &format!(
                        "Unconfirmed incoming {} in transaction {}",
                        format_atomic(outcome.confirmed_total()),
                        tx_id
                    ),
                );
            }
        }
    }

    async fn on_objects(&mut self, response: ResponseGetObjects) -> NodeResult<()> {
        if !response.missed_ids.is_empty() {
            warn!(peer = %self.peer, missed = response.missed_ids.len(), "[SESSION][SYNC] Peer missed requested blocks");
        }
        self.sync.note_peer_height(response.current_blockchain_height);

        let assembled = self.assemble(response.blocks).await?;
        let highest = assembled.iter().map(|block| block.height).max();
        for block in assembled {
            self.accept(block).await;
        }
        if let Some(height) = highest {
            info!(peer = %self.peer, height, "[SESSION][SYNC] Received blocks");
        }
        let request = self.sync.on_objects(highest);
        self.send_sync(request).await
    }

    /// Parse and scan entries off the reactor; malformed entries are dropped.
    async fn assemble(&self, entries: Vec<BlockCompleteEntry>) -> NodeResult<Vec<PendingBlock>> {
        let scanner = self.ctx.scanner.clone();
        let results = tokio::task::spawn_blocking(move || {
            entries
                .iter()
                .map(|entry| assemble_block(entry, scanner.as_ref()))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| NodeError::InvalidState(format!("scan task failed: {e}")))?;

        let mut blocks = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(block) if self.sync.plausible_height(block.height) => blocks.push(block),
                Ok(block) => warn!(
                    peer = %self.peer,
                    height = block.height,
                    peer_height = self.sync.peer_height(),
                    "[SESSION] Dropping block beyond the known chain"
                ),
                Err(e) => warn!(peer = %self.peer, "[SESSION] Dropping block: {}", e),
            }
        }
        Ok(blocks)
    }

    async fn accept(&mut self, block: PendingBlock) {
        self.blocks_received += 1;
        let owned = block.owned.len();
        let (height, total) = (block.height, block.confirmed_total());
        if self.ctx.pool.insert(block).await && owned > 0 {
            self.ctx.notifier.notify(
                NotifyLevel::Info,
                &format!(
                    "Found {} owned output(s) worth {} at height {}",
                    owned,
                    format_atomic(total),
                    height
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluffy_cache_evicts_oldest() {
        let mut cache = FluffyCache::default();
        for i in 0..=MAX_PENDING_FLUFFY as u8 {
            cache.stash(BlockHash::new([i; 32]), vec![vec![i]]);
        }
        assert_eq!(cache.len(), MAX_PENDING_FLUFFY);
        assert!(cache.take(&BlockHash::new([0; 32])).is_empty());
        assert_eq!(cache.take(&BlockHash::new([1; 32])), vec![vec![1]]);
        assert_eq!(cache.len(), MAX_PENDING_FLUFFY - 1);
    }

    #[test]
    fn test_fluffy_cache_restash_keeps_slot() {
        let mut cache = FluffyCache::default();
        let id = BlockHash::new([9; 32]);
        cache.stash(id, vec![vec![1]]);
        cache.stash(id, vec![vec![2]]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take(&id), vec![vec![2]]);
        assert!(cache.take(&id).is_empty());
    }
}
