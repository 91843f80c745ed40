//! Output scanner
//!
//! Decides which outputs of a transaction pay the configured keys and
//! recovers their amounts. Pure CPU work with no I/O; a scan depends only
//! on the transaction and the keys, so running it twice gives the same
//! result.

use std::sync::Arc;

use tracing::{debug, warn};
use umbra_crypto_core::{
    commitment_mask, decompress_point, decrypt_amount, derive_key_image, one_time_public_key,
    output_commitment, EdwardsPoint, Scalar, ScanKeys, SharedSecret,
};
use umbra_types::{KeyImageBytes, TxId};
use umbra_wire::tx::{EcdhInfo, RctType, TxOut, TxSignatures};
use umbra_wire::Transaction;
use zeroize::Zeroize;

use crate::error::NodeError;

/// How far an owned output's amount could be established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountStatus {
    /// Cleartext amount, or decrypted amount whose commitment matches
    Confirmed,
    /// Decrypted amount disagrees with the output commitment
    Inconsistent,
    /// Legacy encryption this scanner does not decode
    Undecoded,
}

/// Which transaction public key opened the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// The transaction public key
    Main,
    /// The per-output additional public key
    Additional,
}

/// An output that pays the scanned keys.
#[derive(Clone)]
pub struct OwnedOutput {
    /// Containing transaction, when its id is computable
    pub tx_id: Option<TxId>,
    /// Position within the transaction's outputs
    pub output_index: usize,
    /// One-time public key `P`
    pub one_time_key: [u8; 32],
    /// Atomic amount; `None` when undecoded
    pub amount: Option<u64>,
    /// Amount status
    pub status: AmountStatus,
    /// Commitment blinding factor, needed to spend
    pub mask: Option<Scalar>,
    /// Key image, when the spend secret is held
    pub key_image: Option<KeyImageBytes>,
    /// One-time secret `x`, when the spend secret is held
    pub one_time_secret: Option<Scalar>,
    /// Key that opened the output
    pub key_source: KeySource,
}

impl OwnedOutput {
    /// True if the amount counts towards confirmed funds.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == AmountStatus::Confirmed
    }

    /// True if this output can be fed to the transaction builder.
    #[must_use]
    pub fn is_spendable(&self) -> bool {
        self.is_confirmed() && self.mask.is_some() && self.one_time_secret.is_some()
    }
}

impl Drop for OwnedOutput {
    fn drop(&mut self) {
        if let Some(mask) = self.mask.as_mut() {
            mask.zeroize();
        }
        if let Some(secret) = self.one_time_secret.as_mut() {
            secret.zeroize();
        }
    }
}

impl std::fmt::Debug for OwnedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedOutput")
            .field("tx_id", &self.tx_id)
            .field("output_index", &self.output_index)
            .field("one_time_key", &hex::encode(self.one_time_key))
            .field("amount", &self.amount)
            .field("status", &self.status)
            .field("mask", &self.mask.map(|_| "[REDACTED]"))
            .field("key_image", &self.key_image)
            .field(
                "one_time_secret",
                &self.one_time_secret.map(|_| "[REDACTED]"),
            )
            .field("key_source", &self.key_source)
            .finish()
    }
}

/// Result of scanning one transaction
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Outputs paying the scanned keys, in output order
    pub outputs: Vec<OwnedOutput>,
    /// Outputs skipped because of a crypto error
    pub errors: usize,
}

impl ScanOutcome {
    /// Sum of confirmed amounts; inconsistent outputs are left out.
    #[must_use]
    pub fn confirmed_total(&self) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.is_confirmed())
            .filter_map(|o| o.amount)
            .fold(0u64, u64::saturating_add)
    }

    /// True if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Scans transactions for outputs owned by one key set.
#[derive(Clone, Debug)]
pub struct Scanner {
    keys: Arc<ScanKeys>,
}

impl Scanner {
    /// Scanner over shared, immutable keys.
    #[must_use]
    pub fn new(keys: Arc<ScanKeys>) -> Self {
        Self { keys }
    }

    /// The scanned keys.
    #[must_use]
    pub fn keys(&self) -> &ScanKeys {
        &self.keys
    }

    /// Scan every output of `tx`.
    #[must_use]
    pub fn scan_transaction(&self, tx: &Transaction) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let extra = tx.prefix.parsed_extra();

        let main_key = extra.tx_public_key();
        let additional = extra.additional_public_keys();
        if main_key.is_none() && additional.is_empty() {
            return outcome;
        }

        let main_shared = main_key.and_then(|bytes| match self.shared_secret(&bytes) {
            Ok(shared) => Some(shared),
            Err(e) => {
                debug!("[SCAN] Unusable transaction public key: {}", e);
                outcome.errors += 1;
                None
            }
        });

        let tx_id = tx.id().ok();
        for (index, output) in tx.prefix.outputs.iter().enumerate() {
            let mut candidates = Vec::with_capacity(2);
            if let Some(shared) = &main_shared {
                candidates.push((shared.clone(), KeySource::Main));
            }
            if let Some(bytes) = additional.get(index) {
                match self.shared_secret(bytes) {
                    Ok(shared) => candidates.push((shared, KeySource::Additional)),
                    Err(e) => {
                        debug!(output_index = index, "[SCAN] Unusable additional key: {}", e);
                        outcome.errors += 1;
                    }
                }
            }

            for (shared, key_source) in candidates {
                match self.match_output(tx, index, output, &shared, key_source) {
                    Ok(Some(mut owned)) => {
                        owned.tx_id = tx_id;
                        outcome.outputs.push(owned);
                        break;
                    }
                    Ok(None) => {}
                    Err(NodeError::ScanMismatch { output_index }) => {
                        debug!(output_index, "[SCAN] View tag matched, key did not");
                    }
                    Err(e) => {
                        debug!(output_index = index, "[SCAN] Output skipped: {}", e);
                        outcome.errors += 1;
                    }
                }
            }
        }

        outcome
    }

    fn shared_secret(&self, tx_public_key: &[u8; 32]) -> Result<SharedSecret, NodeError> {
        let point = decompress_point(tx_public_key, "tx_public_key")?;
        Ok(SharedSecret::receiver(self.keys.view_secret(), &point))
    }

    /// `Ok(None)` when the view tag rules the output out.
    fn match_output(
        &self,
        tx: &Transaction,
        index: usize,
        output: &TxOut,
        shared: &SharedSecret,
        key_source: KeySource,
    ) -> Result<Option<OwnedOutput>, NodeError> {
        let position = index as u64;
        let tagged = match output.view_tag() {
            Some(tag) if tag != shared.view_tag(position) => return Ok(None),
            Some(_) => true,
            None => false,
        };

        let mut output_scalar = shared.output_scalar(position);
        let expected = one_time_public_key(&output_scalar, self.keys.spend_public());
        if expected.compress().to_bytes() != *output.key() {
            output_scalar.zeroize();
            return if tagged {
                Err(NodeError::ScanMismatch {
                    output_index: index,
                })
            } else {
                Ok(None)
            };
        }

        let (amount, status, mask) = recover_amount(tx, index, output, &output_scalar)?;
        output_scalar.zeroize();

        let (key_image, one_time_secret) = match self.keys.spend_secret() {
            Some(spend_secret) => {
                let derived = derive_key_image(shared, position, spend_secret, &expected);
                (
                    Some(KeyImageBytes::new(derived.key_image.compress().to_bytes())),
                    Some(derived.one_time_secret),
                )
            }
            None => (None, None),
        };

        Ok(Some(OwnedOutput {
            tx_id: None,
            output_index: index,
            one_time_key: *output.key(),
            amount,
            status,
            mask,
            key_image,
            one_time_secret,
            key_source,
        }))
    }
}

fn recover_amount(
    tx: &Transaction,
    index: usize,
    output: &TxOut,
    output_scalar: &Scalar,
) -> Result<(Option<u64>, AmountStatus, Option<Scalar>), NodeError> {
    let base = match &tx.signatures {
        TxSignatures::V1(_) => return Ok((Some(output.amount), AmountStatus::Confirmed, None)),
        TxSignatures::Rct { base, .. } => base,
    };
    if base.rct_type == RctType::Null {
        return Ok((
            Some(output.amount),
            AmountStatus::Confirmed,
            Some(Scalar::ONE),
        ));
    }

    match base.ecdh_info.get(index) {
        Some(EcdhInfo::Compact(encrypted)) => {
            let amount = decrypt_amount(*encrypted, output_scalar);
            let rebuilt = output_commitment(output_scalar, amount)?;
            let status = match base.out_pk.get(index) {
                Some(recorded) if commitment_matches(&rebuilt, recorded) => AmountStatus::Confirmed,
                _ => {
                    let err = NodeError::CommitmentInconsistency {
                        output_index: index,
                    };
                    warn!(amount, "[SCAN] {}", err);
                    AmountStatus::Inconsistent
                }
            };
            Ok((Some(amount), status, Some(commitment_mask(output_scalar))))
        }
        Some(EcdhInfo::Full { .. }) | None => Ok((None, AmountStatus::Undecoded, None)),
    }
}

fn commitment_matches(rebuilt: &EdwardsPoint, recorded: &[u8; 32]) -> bool {
    rebuilt.compress().to_bytes() == *recorded
}
