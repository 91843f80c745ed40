//! Peer session
//!
//! One session owns one TCP connection and walks it through
//! Disconnected → Dialing → Handshaking → Ready → Closed. Once Ready, a
//! reader task feeds frames to the dispatcher, a writer task drains the
//! outbound queue, and the dispatch loop emits a timed sync every period.

pub mod connection;
mod dispatch;
pub mod sync;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use umbra_types::Network;
use umbra_wire::p2p::{
    BasicNodeData, CoreSyncData, HandshakeRequest, HandshakeResponse, SUPPORT_FLAG_FLUFFY_BLOCKS,
};
use umbra_wire::{Command, Message};

use crate::collaborators::{Database, Notifier, NotifyLevel};
use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::nodes::NodeList;
use crate::pool::BlockPool;
use crate::scanner::Scanner;

pub use connection::{read_frame, Frame, FrameWriter};
pub use sync::{assemble_block, genesis_id, ChainSync, SyncRequest};

pub use dispatch::MAX_PROTOCOL_FAILURES;

use dispatch::Dispatcher;

type TcpWriter = FrameWriter<OwnedWriteHalf>;

/// Frames buffered between the dispatcher and the writer.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Frames buffered between the reader and the dispatcher.
pub const INBOUND_QUEUE_DEPTH: usize = 16;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started
    Disconnected,
    /// TCP connect in progress
    Dialing,
    /// Handshake sent, waiting for the reply
    Handshaking,
    /// Exchanging messages
    Ready,
    /// Finished; the session is discarded
    Closed,
}

/// Everything sessions share: settings, keys, pool and collaborators.
pub struct SessionContext {
    /// Network to join
    pub network: Network,
    /// Levin payload ceiling
    pub max_frame_bytes: u64,
    /// Dial and handshake ceiling
    pub dial_timeout: Duration,
    /// Write ceiling
    pub write_timeout: Duration,
    /// Timed-sync period
    pub timed_sync_interval: Duration,
    /// Our random peer id
    pub peer_id: u64,
    /// Scanner, absent when no keys are configured
    pub scanner: Option<Scanner>,
    /// Blocks waiting for the database writer
    pub pool: Arc<BlockPool>,
    /// Persistence
    pub database: Arc<dyn Database>,
    /// Event sink
    pub notifier: Arc<dyn Notifier>,
    /// Peers shared by all sessions
    pub nodes: Arc<NodeList>,
}

impl SessionContext {
    /// Context from configuration and collaborators, with a fresh peer id.
    pub fn new(
        config: &NodeConfig,
        scanner: Option<Scanner>,
        database: Arc<dyn Database>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            network: config.network,
            max_frame_bytes: config.max_frame_bytes,
            dial_timeout: config.dial_timeout,
            write_timeout: config.write_timeout,
            timed_sync_interval: config.timed_sync_interval,
            peer_id: rand::random(),
            scanner,
            pool: Arc::new(BlockPool::new()),
            database,
            notifier,
            nodes: Arc::new(NodeList::new()),
        }
    }

    fn node_data(&self) -> BasicNodeData {
        BasicNodeData {
            network_id: self.network.network_id(),
            my_port: 0,
            rpc_port: 0,
            peer_id: self.peer_id,
            support_flags: SUPPORT_FLAG_FLUFFY_BLOCKS,
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionReport {
    /// Remote address
    pub peer: SocketAddr,
    /// The handshake completed
    pub reached_ready: bool,
    /// Blocks received and handed to the pool
    pub blocks_received: u64,
    /// Why the session closed
    pub reason: NodeError,
}

/// One connection to one peer.
pub struct Session {
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
    state: watch::Sender<SessionState>,
    blocks_received: u64,
}

impl Session {
    /// New session in [`SessionState::Disconnected`].
    pub fn new(peer: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            peer,
            ctx,
            state,
            blocks_received: 0,
        }
    }

    /// Remote address.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SessionState) {
        debug!(peer = %self.peer, state = ?next, "[SESSION] State change");
        self.state.send_replace(next);
    }

    /// Run until the connection closes.
    pub async fn run(mut self) -> SessionReport {
        let result = self.drive().await;
        let reached_ready = self.state() == SessionState::Ready;
        self.set_state(SessionState::Closed);

        let reason = match result {
            Ok(()) => NodeError::Closed,
            Err(e) => e,
        };
        if reached_ready {
            info!(
                peer = %self.peer,
                blocks = self.blocks_received,
                "[SESSION] Closed: {}",
                reason
            );
        } else {
            warn!(peer = %self.peer, "[SESSION] Failed before ready: {}", reason);
        }
        SessionReport {
            peer: self.peer,
            reached_ready,
            blocks_received: self.blocks_received,
            reason,
        }
    }

    async fn drive(&mut self) -> NodeResult<()> {
        self.set_state(SessionState::Dialing);
        let dial = TcpStream::connect(self.peer);
        let stream = match tokio::time::timeout(self.ctx.dial_timeout, dial).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(NodeError::Timeout {
                    operation: "dial",
                    after: self.ctx.dial_timeout,
                })
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %self.peer, "[SESSION] Could not disable Nagle: {}", e);
        }
        let (mut reader, write_half) = stream.into_split();
        let writer = FrameWriter::new(write_half, self.ctx.write_timeout);

        self.set_state(SessionState::Handshaking);
        let (height, tip) = self.ctx.database.get_chain_height(self.ctx.network).await?;
        let sync = ChainSync::new(self.ctx.network, height, tip);
        let response = match tokio::time::timeout(
            self.ctx.dial_timeout,
            self.handshake(&mut reader, &writer, sync.core_sync()),
        )
        .await
        {
            Ok(response) => response?,
            Err(_) => {
                return Err(NodeError::Timeout {
                    operation: "handshake",
                    after: self.ctx.dial_timeout,
                })
            }
        };

        self.ctx.nodes.learn(&response.local_peerlist_new).await;
        self.set_state(SessionState::Ready);
        let peer_height = response.payload_data.current_height;
        info!(
            peer = %self.peer,
            peer_height,
            local_height = height,
            "[SESSION][HANDSHAKE] Ready"
        );
        self.ctx.notifier.notify(
            NotifyLevel::Debug,
            &format!("Connected to {} at height {}", self.peer, peer_height),
        );

        let result = self.serve(reader, writer.clone(), sync, peer_height).await;
        writer.shutdown().await;
        result
    }

    async fn handshake<R>(
        &self,
        reader: &mut R,
        writer: &TcpWriter,
        payload_data: CoreSyncData,
    ) -> NodeResult<HandshakeResponse>
    where
        R: AsyncRead + Unpin,
    {
        writer
            .send(&HandshakeRequest {
                node_data: self.ctx.node_data(),
                payload_data,
            })
            .await?;
        debug!(peer = %self.peer, "[SESSION][HANDSHAKE] Request sent");

        loop {
            let frame = read_frame(reader, self.ctx.max_frame_bytes).await?;
            if frame.header.command != Command::Handshake || !frame.header.is_response() {
                debug!(
                    peer = %self.peer,
                    command = frame.header.command.id(),
                    "[SESSION][HANDSHAKE] Ignoring message before handshake reply"
                );
                continue;
            }
            if frame.header.return_code < 0 {
                return Err(NodeError::Protocol {
                    command: Command::Handshake.id(),
                    return_code: frame.header.return_code,
                });
            }
            let response = HandshakeResponse::from_payload(&frame.payload)?;
            if response.node_data.network_id != self.ctx.network.network_id() {
                return Err(NodeError::InvalidState(format!(
                    "peer {} is not on {}",
                    self.peer, self.ctx.network
                )));
            }
            return Ok(response);
        }
    }

    async fn serve<R>(
        &mut self,
        reader: R,
        writer: TcpWriter,
        sync: ChainSync,
        peer_height: u64,
    ) -> NodeResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let reader_task = spawn_reader(reader, self.ctx.max_frame_bytes, inbound_tx);
        let mut writer_task = spawn_writer(writer, outbound_rx);

        let mut dispatcher = Dispatcher::new(Arc::clone(&self.ctx), self.peer, sync, outbound_tx);
        let period = self.ctx.timed_sync_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut result = dispatcher.start(peer_height).await;
        while result.is_ok() {
            result = tokio::select! {
                frame = inbound_rx.recv() => match frame {
                    Some(Ok(frame)) => dispatcher.handle(frame).await,
                    Some(Err(e)) => Err(e),
                    None => Err(NodeError::Closed),
                },
                _ = ticker.tick() => dispatcher.timed_sync().await,
                joined = &mut writer_task => match joined {
                    Ok(Err(e)) => Err(e),
                    _ => Err(NodeError::Closed),
                },
            };
            self.blocks_received = dispatcher.blocks_received();
        }

        reader_task.abort();
        writer_task.abort();
        result
    }
}

fn spawn_reader<R>(
    mut reader: R,
    max_frame_bytes: u64,
    frames: mpsc::Sender<NodeResult<Frame>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let frame = read_frame(&mut reader, max_frame_bytes).await;
            let failed = frame.is_err();
            if frames.send(frame).await.is_err() || failed {
                break;
            }
        }
    })
}

fn spawn_writer(
    writer: TcpWriter,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<NodeResult<()>> {
    tokio::spawn(async move {
        while let Some(bytes) = outbound.recv().await {
            writer.write_frame(&bytes).await?;
        }
        Ok(())
    })
}
