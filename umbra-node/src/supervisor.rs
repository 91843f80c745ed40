//! Session supervisor
//!
//! Keeps up to `max_sessions` sessions open against known peers, replaces
//! each one that closes with a session to a different peer, and runs the
//! database writer that drains the block pool.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};
use umbra_types::format_atomic;

use crate::collaborators::NotifyLevel;
use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::session::{Session, SessionContext, SessionReport};

/// Pause before retrying when no peer is available.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Longest the database writer waits between pool drains.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Runs sessions and the database writer.
pub struct Supervisor {
    ctx: Arc<SessionContext>,
    max_sessions: usize,
    seeds: Vec<SocketAddr>,
}

impl Supervisor {
    /// Supervisor over `ctx`, seeded from `config`.
    pub fn new(config: &NodeConfig, ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            max_sessions: config.max_sessions.max(1),
            seeds: config.seed_peers.clone(),
        }
    }

    /// Shared session context.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Run until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] when neither the seeds nor the database name a
    /// peer; database errors while loading peers.
    pub async fn run<F>(self, shutdown: F) -> NodeResult<()>
    where
        F: Future<Output = ()>,
    {
        let nodes = Arc::clone(&self.ctx.nodes);
        nodes.add(self.seeds.iter().copied()).await;
        let stored = self.ctx.database.get_node_addrs(self.ctx.network).await?;
        nodes.add(stored).await;
        if nodes.is_empty().await {
            return Err(NodeError::Config(format!(
                "no peers known for {}",
                self.ctx.network
            )));
        }
        info!(
            network = %self.ctx.network,
            peers = nodes.len().await,
            max_sessions = self.max_sessions,
            "[SUPERVISOR] Starting"
        );

        let writer = tokio::spawn(db_writer(Arc::clone(&self.ctx)));
        let mut sessions = JoinSet::new();
        self.fill(&mut sessions, None).await;

        tokio::pin!(shutdown);
        loop {
            if sessions.is_empty() {
                tokio::select! {
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {
                        nodes.reset_failures().await;
                        self.fill(&mut sessions, None).await;
                    }
                }
                continue;
            }

            tokio::select! {
                () = &mut shutdown => break,
                joined = sessions.join_next() => match joined {
                    Some(Ok(report)) => {
                        self.on_closed(&report).await;
                        self.fill(&mut sessions, Some(report.peer)).await;
                    }
                    Some(Err(e)) => error!("[SUPERVISOR] Session task failed: {}", e),
                    None => {}
                },
            }
        }

        info!("[SUPERVISOR] Shutting down");
        sessions.abort_all();
        writer.abort();
        flush_pool(&self.ctx).await;
        Ok(())
    }

    async fn fill(&self, sessions: &mut JoinSet<SessionReport>, avoid: Option<SocketAddr>) {
        while sessions.len() < self.max_sessions {
            let Some(peer) = self.ctx.nodes.acquire(avoid).await else {
                break;
            };
            info!(peer = %peer, "[SUPERVISOR] Opening session");
            sessions.spawn(Session::new(peer, Arc::clone(&self.ctx)).run());
        }
    }

    async fn on_closed(&self, report: &SessionReport) {
        self.ctx
            .nodes
            .release(report.peer, report.reached_ready)
            .await;
        if report.reached_ready {
            self.ctx.notifier.notify(
                NotifyLevel::Info,
                &format!(
                    "Session with {} closed after {} blocks: {}",
                    report.peer, report.blocks_received, report.reason
                ),
            );
        } else {
            warn!(peer = %report.peer, "[SUPERVISOR] Session failed: {}", report.reason);
        }
    }
}

async fn db_writer(ctx: Arc<SessionContext>) {
    loop {
        tokio::select! {
            () = ctx.pool.wait() => {}
            () = tokio::time::sleep(FLUSH_INTERVAL) => {}
        }
        flush_pool(&ctx).await;
    }
}

/// Persist every pending block in height order.
pub async fn flush_pool(ctx: &SessionContext) {
    for block in ctx.pool.drain_ordered().await {
        match ctx.database.process_block(ctx.network, &block).await {
            Ok(()) => {
                if !block.owned.is_empty() {
                    ctx.notifier.notify(
                        NotifyLevel::Info,
                        &format!(
                            "Received {} in block {} at height {}",
                            format_atomic(block.confirmed_total()),
                            block.id,
                            block.height
                        ),
                    );
                }
            }
            Err(e) => ctx.notifier.notify(
                NotifyLevel::Warn,
                &format!("Failed to persist block {}: {}", block.height, e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Database, MemoryDatabase, TracingNotifier};
    use crate::pool::tests::pending;
    use umbra_types::Network;

    fn context(db: Arc<MemoryDatabase>) -> Arc<SessionContext> {
        Arc::new(SessionContext::new(
            &NodeConfig::default(),
            None,
            db,
            Arc::new(TracingNotifier),
        ))
    }

    #[tokio::test]
    async fn test_run_without_peers_is_config_error() {
        let db = Arc::new(MemoryDatabase::new());
        let supervisor = Supervisor::new(&NodeConfig::default(), context(db));
        let result = supervisor.run(std::future::pending()).await;
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[tokio::test]
    async fn test_flush_persists_in_height_order() {
        let db = Arc::new(MemoryDatabase::new());
        let ctx = context(Arc::clone(&db));
        ctx.pool.insert(pending(6)).await;
        ctx.pool.insert(pending(5)).await;

        flush_pool(&ctx).await;
        let (height, tip) = db.get_chain_height(Network::Mainnet).await.unwrap();
        assert_eq!(height, 7);
        assert_eq!(tip, pending(6).id);
        assert!(ctx.pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_failing_sessions() {
        let db = Arc::new(MemoryDatabase::new());
        let config = NodeConfig {
            seed_peers: vec!["127.0.0.1:1".parse().unwrap()],
            dial_timeout: Duration::from_millis(200),
            ..NodeConfig::default()
        };
        let ctx = Arc::new(SessionContext::new(
            &config,
            None,
            db,
            Arc::new(TracingNotifier),
        ));
        let supervisor = Supervisor::new(&config, Arc::clone(&ctx));
        let result = supervisor
            .run(tokio::time::sleep(Duration::from_millis(300)))
            .await;
        assert!(result.is_ok());
    }
}
