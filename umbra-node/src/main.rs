//! umbra-node: light peer that walks the chain and reports owned funds.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use umbra_node::{
    init_telemetry, MemoryDatabase, NodeConfig, Scanner, SessionContext, Supervisor,
    TracingNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry().context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    let keys = config
        .keys
        .scan_keys()
        .context("Failed to load key material")?;
    let scanner = match keys {
        Some(keys) => Some(Scanner::new(Arc::new(keys))),
        None => {
            warn!("No view key configured; blocks will be walked but not scanned");
            None
        }
    };

    info!(
        network = %config.network,
        peers = config.seed_peers.len(),
        scanning = scanner.is_some(),
        "Starting umbra-node v{}",
        env!("CARGO_PKG_VERSION")
    );

    let database = Arc::new(MemoryDatabase::new());
    let ctx = Arc::new(SessionContext::new(
        &config,
        scanner,
        database,
        Arc::new(TracingNotifier),
    ));
    let supervisor = Supervisor::new(&config, ctx);

    supervisor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received");
        })
        .await
        .context("Supervisor stopped")?;

    info!("umbra-node stopped");
    Ok(())
}
