//! Daemon RPC and decoy selection
//!
//! The builder needs three things from a full node: the global index of the
//! output being spent, the per-block output distribution, and the keys and
//! commitments of the decoys picked from it. Every failure on this path is
//! reported as [`NodeError::DecoySelectionUnavailable`].
//!
//! Decoys are drawn with the gamma picker of the reference wallet. An
//! output age is sampled in log-seconds and converted to an output offset
//! from the tip using the recent average output time. The offset selects a
//! block, and a uniformly chosen output of that block joins the ring.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use umbra_crypto_core::{decompress_point, EdwardsPoint};
use umbra_types::TxId;

use crate::error::{NodeError, NodeResult};

/// One ring member as the signer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingMember {
    /// Global output index
    pub global_index: u64,
    /// One-time public key
    pub key: EdwardsPoint,
    /// Output commitment
    pub commitment: EdwardsPoint,
}

/// Where decoys come from.
#[async_trait]
pub trait DecoySource: Send + Sync {
    /// Global index of output `vout` of `tx_id`.
    async fn global_output_index(&self, tx_id: &TxId, vout: usize) -> NodeResult<u64>;

    /// Cumulative ring-CT output counts, one entry per block from genesis.
    async fn output_distribution(&self) -> NodeResult<Vec<u64>>;

    /// Keys and commitments of the outputs at `indices`, in the same order.
    async fn fetch_outputs(&self, indices: &[u64]) -> NodeResult<Vec<RingMember>>;
}

fn unavailable(context: &str, detail: impl std::fmt::Display) -> NodeError {
    NodeError::DecoySelectionUnavailable(format!("{context}: {detail}"))
}

#[derive(Debug, Deserialize)]
struct GetTransactionsResponse {
    #[serde(default)]
    txs: Vec<TransactionEntry>,
    #[serde(default)]
    missed_tx: Vec<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    #[serde(default)]
    tx_hash: String,
    #[serde(default)]
    output_indices: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct OutputDistributionResult {
    #[serde(default)]
    distributions: Vec<OutputDistribution>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OutputDistribution {
    #[serde(default)]
    distribution: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct GetOutsResponse {
    #[serde(default)]
    outs: Vec<OutEntry>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OutEntry {
    key: String,
    mask: String,
    #[serde(default)]
    unlocked: bool,
}

/// JSON client for a full node's RPC port
#[derive(Clone, Debug)]
pub struct DaemonRpc {
    daemon_url: String,
    client: Client,
}

impl DaemonRpc {
    /// Client for `daemon_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] if the HTTP client cannot be built.
    pub fn new(daemon_url: &str, timeout: Duration) -> NodeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            daemon_url: daemon_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> NodeResult<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/{}", self.daemon_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    unavailable(path, "daemon unreachable")
                } else {
                    unavailable(path, e)
                }
            })?;

        if !response.status().is_success() {
            return Err(unavailable(
                path,
                format!("daemon returned HTTP {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| unavailable(path, format!("JSON parse error: {e}")))
    }

    async fn json_rpc(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> NodeResult<serde_json::Value> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
            "params": params
        });

        let mut rpc_response = self.post("json_rpc", &request).await?;

        if let Some(error) = rpc_response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(unavailable(method, message));
        }

        rpc_response
            .get_mut("result")
            .map(serde_json::Value::take)
            .ok_or_else(|| unavailable(method, "missing result"))
    }

    /// Global indices of every output of `tx_id`.
    ///
    /// # Errors
    ///
    /// [`NodeError::DecoySelectionUnavailable`].
    pub async fn get_output_indices(&self, tx_id: &TxId) -> NodeResult<Vec<u64>> {
        let request = serde_json::json!({
            "txs_hashes": [tx_id.to_hex()],
            "decode_as_json": false
        });
        let raw = self.post("get_transactions", &request).await?;
        let response: GetTransactionsResponse = serde_json::from_value(raw)
            .map_err(|e| unavailable("get_transactions", e))?;
        check_status("get_transactions", &response.status)?;

        if !response.missed_tx.is_empty() {
            return Err(unavailable(
                "get_transactions",
                format!("daemon does not know {tx_id}"),
            ));
        }
        response
            .txs
            .into_iter()
            .find(|tx| tx.tx_hash.is_empty() || tx.tx_hash.eq_ignore_ascii_case(&tx_id.to_hex()))
            .map(|tx| tx.output_indices)
            .ok_or_else(|| unavailable("get_transactions", format!("no entry for {tx_id}")))
    }
}

fn check_status(context: &str, status: &str) -> NodeResult<()> {
    if status == "OK" {
        Ok(())
    } else {
        Err(unavailable(context, format!("status {status}")))
    }
}

fn parse_point(hex_str: &str, field: &str) -> NodeResult<EdwardsPoint> {
    let bytes: [u8; 32] = hex::decode(hex_str)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| unavailable("get_outs", format!("malformed {field}")))?;
    decompress_point(&bytes, field).map_err(|e| unavailable("get_outs", e))
}

#[async_trait]
impl DecoySource for DaemonRpc {
    async fn global_output_index(&self, tx_id: &TxId, vout: usize) -> NodeResult<u64> {
        let indices = self.get_output_indices(tx_id).await?;
        indices.get(vout).copied().ok_or_else(|| {
            unavailable(
                "get_transactions",
                format!("{tx_id} has {} outputs, wanted {vout}", indices.len()),
            )
        })
    }

    async fn output_distribution(&self) -> NodeResult<Vec<u64>> {
        let result = self
            .json_rpc(
                "get_output_distribution",
                serde_json::json!({
                    "amounts": [0],
                    "cumulative": true,
                    "from_height": 0
                }),
            )
            .await?;
        let result: OutputDistributionResult = serde_json::from_value(result)
            .map_err(|e| unavailable("get_output_distribution", e))?;
        check_status("get_output_distribution", &result.status)?;

        let distribution = result
            .distributions
            .into_iter()
            .next()
            .map(|d| d.distribution)
            .filter(|d| d.last().is_some_and(|&total| total > 0))
            .ok_or_else(|| unavailable("get_output_distribution", "empty distribution"))?;
        debug!(
            blocks = distribution.len(),
            total_outputs = distribution.last().copied().unwrap_or_default(),
            "[RPC] Output distribution"
        );
        Ok(distribution)
    }

    async fn fetch_outputs(&self, indices: &[u64]) -> NodeResult<Vec<RingMember>> {
        let outputs: Vec<serde_json::Value> = indices
            .iter()
            .map(|&index| serde_json::json!({ "amount": 0, "index": index }))
            .collect();
        let request = serde_json::json!({ "outputs": outputs, "get_txid": false });

        let raw = self.post("get_outs", &request).await?;
        let response: GetOutsResponse =
            serde_json::from_value(raw).map_err(|e| unavailable("get_outs", e))?;
        check_status("get_outs", &response.status)?;

        if response.outs.len() != indices.len() {
            return Err(unavailable(
                "get_outs",
                format!("asked for {} outputs, got {}", indices.len(), response.outs.len()),
            ));
        }

        indices
            .iter()
            .zip(response.outs)
            .map(|(&global_index, out)| {
                if !out.unlocked {
                    debug!(global_index, "[RPC] Ring member still locked");
                }
                Ok(RingMember {
                    global_index,
                    key: parse_point(&out.key, "key")?,
                    commitment: parse_point(&out.mask, "mask")?,
                })
            })
            .collect()
    }
}

/// Gamma shape of the output spend-age model, in log-seconds
const GAMMA_SHAPE: f64 = 19.28;

/// Gamma rate; the scale is its inverse
const GAMMA_RATE: f64 = 1.61;

/// Target block time in seconds
const BLOCK_TIME_SECS: f64 = 120.0;

/// Blocks an output must age before it can be spent
pub const SPENDABLE_AGE: usize = 10;

/// Ages younger than this are redrawn uniformly inside the window
const UNLOCK_WINDOW_SECS: f64 = SPENDABLE_AGE as f64 * BLOCK_TIME_SECS;

/// Blocks used to estimate the average output time
const BLOCKS_PER_YEAR: usize = 86_400 * 365 / 120;

/// Gamma draws per ring member before falling back to uniform picks
const PICK_ATTEMPTS_PER_MEMBER: usize = 100;

/// Ring member selector over a cumulative output distribution
#[derive(Debug, Clone)]
pub struct RingSelector {
    gamma: Gamma<f64>,
    /// Cumulative counts of the blocks whose outputs are spendable
    offsets: Vec<u64>,
    average_output_time: f64,
}

impl RingSelector {
    /// Selector for the cumulative per-block counts of `get_output_distribution`.
    ///
    /// # Errors
    ///
    /// [`NodeError::DecoySelectionUnavailable`] when the chain is younger than
    /// [`SPENDABLE_AGE`] blocks or holds no spendable outputs.
    pub fn from_distribution(cumulative: &[u64]) -> NodeResult<Self> {
        if cumulative.len() <= SPENDABLE_AGE {
            return Err(unavailable(
                "decoys",
                format!("distribution covers only {} blocks", cumulative.len()),
            ));
        }
        let offsets = cumulative[..cumulative.len() - SPENDABLE_AGE].to_vec();
        if offsets.last().copied().unwrap_or_default() == 0 {
            return Err(unavailable("decoys", "no spendable outputs"));
        }

        let blocks = cumulative.len().min(BLOCKS_PER_YEAR);
        let before = if blocks < cumulative.len() {
            cumulative[cumulative.len() - blocks - 1]
        } else {
            0
        };
        let recent = cumulative
            .last()
            .copied()
            .unwrap_or_default()
            .saturating_sub(before);
        if recent == 0 {
            return Err(unavailable("decoys", "no outputs in the recent window"));
        }

        let gamma =
            Gamma::new(GAMMA_SHAPE, 1.0 / GAMMA_RATE).map_err(|e| unavailable("decoys", e))?;
        Ok(Self {
            gamma,
            offsets,
            average_output_time: BLOCK_TIME_SECS * blocks as f64 / recent as f64,
        })
    }

    /// Number of outputs old enough to be ring members.
    #[must_use]
    pub fn spendable_outputs(&self) -> u64 {
        self.offsets.last().copied().unwrap_or_default()
    }

    /// One gamma draw; `None` when the sampled age predates the chain.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u64> {
        let mut seconds = self.gamma.sample(rng).exp();
        if seconds > UNLOCK_WINDOW_SECS {
            seconds -= UNLOCK_WINDOW_SECS;
        } else {
            seconds = rng.gen_range(0.0..UNLOCK_WINDOW_SECS);
        }

        let total = self.spendable_outputs();
        let back = (seconds / self.average_output_time) as u64;
        if back >= total {
            return None;
        }
        let target = total - 1 - back;

        let block = self.offsets.partition_point(|&cumulative| cumulative <= target);
        let first = match block {
            0 => 0,
            n => *self.offsets.get(n - 1)?,
        };
        let count = self.offsets.get(block)?.checked_sub(first)?;
        (count > 0).then(|| first + rng.gen_range(0..count))
    }

    /// Pick `ring_size - 1` distinct decoys around `real`. Returns the
    /// sorted ring and the position of `real` in it.
    ///
    /// # Errors
    ///
    /// [`NodeError::DecoySelectionUnavailable`] when the spendable set is
    /// too small or does not contain `real`.
    pub fn select_ring<R: Rng + ?Sized>(
        &self,
        real: u64,
        ring_size: usize,
        rng: &mut R,
    ) -> NodeResult<(Vec<u64>, usize)> {
        if ring_size == 0 {
            return Err(unavailable("decoys", "ring size must be positive"));
        }
        let total = self.spendable_outputs();
        if real >= total {
            return Err(unavailable(
                "decoys",
                format!("real output {real} is not among {total} spendable outputs"),
            ));
        }
        if total < ring_size as u64 {
            return Err(unavailable(
                "decoys",
                format!("{total} outputs cannot fill a ring of {ring_size}"),
            ));
        }

        let mut ring = BTreeSet::new();
        ring.insert(real);
        let mut attempts = ring_size.saturating_mul(PICK_ATTEMPTS_PER_MEMBER);
        while ring.len() < ring_size && attempts > 0 {
            attempts -= 1;
            if let Some(index) = self.pick(rng) {
                ring.insert(index);
            }
        }
        if ring.len() < ring_size {
            debug!(
                picked = ring.len(),
                ring_size, "[RPC] Gamma draws exhausted, filling ring uniformly"
            );
            while ring.len() < ring_size {
                ring.insert(rng.gen_range(0..total));
            }
        }

        let ring: Vec<u64> = ring.into_iter().collect();
        let position = ring
            .iter()
            .position(|&index| index == real)
            .ok_or_else(|| unavailable("decoys", "real output lost from ring"))?;
        Ok((ring, position))
    }
}

/// Build a full ring around the output at `real_index`.
///
/// # Errors
///
/// [`NodeError::DecoySelectionUnavailable`] from the source, or if the
/// fetched real member does not carry `real_key`.
pub async fn fetch_ring<S, R>(
    source: &S,
    real_index: u64,
    real_key: &EdwardsPoint,
    ring_size: usize,
    rng: &mut R,
) -> NodeResult<(Vec<RingMember>, usize)>
where
    S: DecoySource + ?Sized,
    R: Rng + Send,
{
    let distribution = source.output_distribution().await?;
    let selector = RingSelector::from_distribution(&distribution)?;
    let (indices, position) = selector.select_ring(real_index, ring_size, rng)?;
    let members = source.fetch_outputs(&indices).await?;

    match members.get(position) {
        Some(member) if member.key == *real_key => Ok((members, position)),
        _ => Err(unavailable(
            "decoys",
            format!("daemon key for output {real_index} does not match the owned output"),
        )),
    }
}
