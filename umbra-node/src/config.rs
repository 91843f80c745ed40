//! Node configuration
//!
//! Read once at startup from environment variables, after `.env` has been
//! loaded by the binary. Every value has a default except the key material.

use std::net::SocketAddr;
use std::time::Duration;

use umbra_crypto_core::curve::scalar_from_hex;
use umbra_crypto_core::ScanKeys;
use umbra_types::Network;
use umbra_wire::DEFAULT_MAX_PAYLOAD;

use crate::error::{NodeError, NodeResult};

/// Smallest accepted payload ceiling (1 MiB)
pub const MIN_FRAME_BYTES: u64 = 1024 * 1024;

/// Largest accepted payload ceiling (100 MiB)
pub const MAX_FRAME_BYTES: u64 = DEFAULT_MAX_PAYLOAD;

/// Default number of parallel sessions
pub const DEFAULT_MAX_SESSIONS: usize = 4;

/// Default dial ceiling in seconds
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 15;

/// Default write ceiling in seconds
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;

/// Default timed-sync period in seconds
pub const DEFAULT_TIMED_SYNC_SECS: u64 = 30;

/// Default daemon RPC endpoint
pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:18081";

/// Default daemon RPC timeout in seconds
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Hex key material as configured. Parsed into [`ScanKeys`] on demand so
/// the secrets are not kept around as strings longer than needed.
#[derive(Clone, Default)]
pub struct KeyConfig {
    /// Private view key, hex
    pub view_key: Option<String>,
    /// Public spend key, hex
    pub spend_public: Option<String>,
    /// Private spend key, hex
    pub spend_key: Option<String>,
    /// Address supplying the public spend key
    pub address: Option<String>,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("view_key", &self.view_key.as_ref().map(|_| "[REDACTED]"))
            .field("spend_public", &self.spend_public)
            .field("spend_key", &self.spend_key.as_ref().map(|_| "[REDACTED]"))
            .field("address", &self.address)
            .finish()
    }
}

impl KeyConfig {
    /// Build the scan key set, or `None` when no view key is configured.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] when a view key is given without a spend key
    /// or address, and [`NodeError::Crypto`] for malformed keys.
    pub fn scan_keys(&self) -> NodeResult<Option<ScanKeys>> {
        let Some(view_key) = self.view_key.as_deref() else {
            return Ok(None);
        };

        let keys = match (self.spend_public.as_deref(), self.address.as_deref()) {
            (Some(spend_public), _) => ScanKeys::from_hex(view_key, spend_public, None)?,
            (None, Some(address)) => ScanKeys::from_address(view_key, address)?,
            (None, None) => {
                if let Some(spend_key) = self.spend_key.as_deref() {
                    ScanKeys::with_spend_secret(
                        scalar_from_hex(view_key, "view_key")?,
                        scalar_from_hex(spend_key, "spend_key")?,
                    )
                } else {
                    return Err(NodeError::Config(
                        "UMBRA_VIEW_KEY needs UMBRA_SPEND_PUB, UMBRA_ADDRESS or UMBRA_SPEND_KEY"
                            .into(),
                    ));
                }
            }
        };

        match self.spend_key.as_deref() {
            Some(spend_key) if keys.spend_secret().is_none() => Ok(Some(
                keys.attach_spend_secret(scalar_from_hex(spend_key, "spend_key")?)?,
            )),
            _ => Ok(Some(keys)),
        }
    }
}

/// Runtime configuration of the light peer
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Network to join
    pub network: Network,
    /// Seed peers, tried before any database-supplied address
    pub seed_peers: Vec<SocketAddr>,
    /// Sessions to keep open in parallel
    pub max_sessions: usize,
    /// Levin payload ceiling
    pub max_frame_bytes: u64,
    /// Dial ceiling
    pub dial_timeout: Duration,
    /// Write ceiling
    pub write_timeout: Duration,
    /// Timed-sync period
    pub timed_sync_interval: Duration,
    /// Daemon RPC base URL
    pub daemon_url: String,
    /// Daemon RPC request timeout
    pub rpc_timeout: Duration,
    /// Key material
    pub keys: KeyConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            seed_peers: Vec::new(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_frame_bytes: MAX_FRAME_BYTES,
            dial_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            timed_sync_interval: Duration::from_secs(DEFAULT_TIMED_SYNC_SECS),
            daemon_url: DEFAULT_DAEMON_URL.to_string(),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            keys: KeyConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] for an unknown network or malformed peer list.
    pub fn from_env() -> NodeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// As [`NodeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> NodeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|&s| s > 0)
                .map_or(default, Duration::from_secs)
        };

        let network = match lookup("UMBRA_NETWORK") {
            Some(raw) => raw
                .parse::<Network>()
                .map_err(|_| NodeError::Config(format!("unknown network '{raw}'")))?,
            None => defaults.network,
        };

        let seed_peers = match lookup("UMBRA_PEERS") {
            Some(raw) => parse_peers(&raw)?,
            None => Vec::new(),
        };

        let max_sessions = lookup("UMBRA_MAX_SESSIONS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.max_sessions);

        let max_frame_bytes = lookup("UMBRA_MAX_FRAME_BYTES")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or(defaults.max_frame_bytes, clamp_frame_bytes);

        Ok(Self {
            network,
            seed_peers,
            max_sessions,
            max_frame_bytes,
            dial_timeout: secs("UMBRA_DIAL_TIMEOUT_SECS", defaults.dial_timeout),
            write_timeout: secs("UMBRA_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            timed_sync_interval: secs("UMBRA_TIMED_SYNC_SECS", defaults.timed_sync_interval),
            daemon_url: lookup("UMBRA_DAEMON_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.daemon_url),
            rpc_timeout: secs("UMBRA_RPC_TIMEOUT_SECS", defaults.rpc_timeout),
            keys: KeyConfig {
                view_key: lookup("UMBRA_VIEW_KEY"),
                spend_public: lookup("UMBRA_SPEND_PUB"),
                spend_key: lookup("UMBRA_SPEND_KEY"),
                address: lookup("UMBRA_ADDRESS"),
            },
        })
    }
}

fn clamp_frame_bytes(bytes: u64) -> u64 {
    if bytes < MIN_FRAME_BYTES {
        tracing::warn!(
            bytes = bytes,
            min = MIN_FRAME_BYTES,
            "UMBRA_MAX_FRAME_BYTES below minimum, using minimum"
        );
        MIN_FRAME_BYTES
    } else if bytes > MAX_FRAME_BYTES {
        tracing::warn!(
            bytes = bytes,
            max = MAX_FRAME_BYTES,
            "UMBRA_MAX_FRAME_BYTES above maximum, using maximum"
        );
        MAX_FRAME_BYTES
    } else {
        bytes
    }
}

/// Parse a comma-separated `host:port` list; blanks are skipped.
///
/// # Errors
///
/// [`NodeError::Config`] naming the first entry that is not a socket address.
pub fn parse_peers(raw: &str) -> NodeResult<Vec<SocketAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SocketAddr>()
                .map_err(|_| NodeError::Config(format!("invalid peer address '{s}'")))
        })
        .collect()
}
