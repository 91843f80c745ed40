//! Transaction construction
//!
//! Turns owned outputs plus destinations into a signed ring-CT
//! transaction (version 2, CLSAG with Bulletproof-Plus). The result is
//! serialized and identified but never broadcast.
//!
//! # Flow
//!
//! 1. Fetch a ring for every input ([`TransactionBuilder::prepare_input`])
//! 2. Derive stealth keys, view tags, encrypted amounts and commitments
//!    from a fresh transaction key `r`
//! 3. Prove every output amount with one aggregated Bulletproof-Plus
//! 4. Balance pseudo-output masks against the output masks
//! 5. Sign each input with CLSAG over the full transaction message

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use rand::{CryptoRng, Rng, RngCore};
use tracing::{debug, info};
use umbra_crypto_core::{
    commit, commitment_mask, compute_key_image, decode_address, decompress_prime_order,
    encrypt_amount, one_time_public_key, prove_bulletproof_plus, random_scalar, sign_clsag,
    AddressType, BpPlusGenerators, ClsagRing, EdwardsPoint, Scalar, SharedSecret,
};
use umbra_types::{format_atomic, KeyImageBytes, Network, TxId};
use umbra_wire::tx::{
    clsag_message, keccak256_parts, relative_offsets, BulletproofPlusData, ClsagData, EcdhInfo,
    ExtraField, Nonce, OutputTarget, RangeProofs, RctBase, RctPrunable, RctType,
    TransactionPrefix, TxIn, TxOut, TxSignatures,
};
use umbra_wire::{Extra, Transaction};
use zeroize::Zeroize;

use crate::error::{NodeError, NodeResult};
use crate::rpc::{fetch_ring, DecoySource, RingMember};
use crate::scanner::OwnedOutput;

/// Ring size used by current consensus rules
pub const DEFAULT_RING_SIZE: usize = 16;

/// Most outputs one Bulletproof-Plus can cover
pub const MAX_OUTPUTS: usize = 16;

/// Tail byte hashed with the derivation to mask an integrated payment id
const ENCRYPTED_PAYMENT_ID_TAIL: u8 = 0x8d;

/// An owned output ready to be spent.
pub struct SpendableInput {
    /// One-time secret `x` with `x·G = P`
    pub one_time_secret: Scalar,
    /// Commitment mask
    pub mask: Scalar,
    /// Atomic amount
    pub amount: u64,
    /// Transaction that created the output
    pub tx_id: TxId,
    /// Position within that transaction's outputs
    pub output_index: usize,
}

impl SpendableInput {
    /// Take the spend data of a scanned output.
    ///
    /// # Errors
    ///
    /// [`NodeError::Build`] unless the output is confirmed, its transaction
    /// id is known and it was scanned with the private spend key.
    pub fn from_owned(owned: &OwnedOutput) -> NodeResult<Self> {
        match (
            owned.is_confirmed(),
            owned.tx_id,
            owned.one_time_secret,
            owned.mask,
            owned.amount,
        ) {
            (true, Some(tx_id), Some(one_time_secret), Some(mask), Some(amount)) => Ok(Self {
                one_time_secret,
                mask,
                amount,
                tx_id,
                output_index: owned.output_index,
            }),
            _ => Err(NodeError::Build(format!(
                "output {} is not spendable",
                owned.output_index
            ))),
        }
    }

    /// One-time public key `P = x·G`.
    #[must_use]
    pub fn one_time_public(&self) -> EdwardsPoint {
        &self.one_time_secret * ED25519_BASEPOINT_TABLE
    }
}

impl Drop for SpendableInput {
    fn drop(&mut self) {
        self.one_time_secret.zeroize();
        self.mask.zeroize();
    }
}

impl std::fmt::Debug for SpendableInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendableInput")
            .field("one_time_secret", &"[REDACTED]")
            .field("mask", &"[REDACTED]")
            .field("amount", &self.amount)
            .field("tx_id", &self.tx_id)
            .field("output_index", &self.output_index)
            .finish()
    }
}

/// An input with its ring.
#[derive(Debug)]
pub struct PreparedInput {
    /// The real spend
    pub input: SpendableInput,
    /// Ring members sorted by global index
    pub ring: Vec<RingMember>,
    /// Position of the real spend in `ring`
    pub real_position: usize,
}

/// A payment to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Standard or integrated address
    pub address: String,
    /// Atomic amount
    pub amount: u64,
}

/// A signed, serialized transaction.
#[derive(Debug)]
pub struct BuiltTransaction {
    /// Parsed form
    pub transaction: Transaction,
    /// Serialized blob
    pub blob: Vec<u8>,
    /// Transaction id
    pub tx_id: TxId,
    /// Fee paid
    pub fee: u64,
    /// Key images, in input order
    pub key_images: Vec<KeyImageBytes>,
}

struct PlannedOutput {
    target: OutputTarget,
    encrypted_amount: [u8; 8],
    mask: Scalar,
    commitment: EdwardsPoint,
    amount: u64,
}

struct SortedInput {
    prepared: PreparedInput,
    key_image: EdwardsPoint,
}

/// Builds spends for one network.
#[derive(Debug, Clone, Copy)]
pub struct TransactionBuilder {
    network: Network,
    ring_size: usize,
}

impl TransactionBuilder {
    /// Builder with the default ring size.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ring_size: DEFAULT_RING_SIZE,
        }
    }

    /// Override the ring size.
    #[must_use]
    pub fn with_ring_size(mut self, ring_size: usize) -> Self {
        self.ring_size = ring_size;
        self
    }

    /// Configured ring size.
    #[must_use]
    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// Resolve the global index of `input`, fetch decoys and place it in a
    /// ring.
    ///
    /// # Errors
    ///
    /// [`NodeError::DecoySelectionUnavailable`] on any RPC failure, or when
    /// the daemon's key for the output differs from ours.
    pub async fn prepare_input<S, R>(
        &self,
        source: &S,
        input: SpendableInput,
        rng: &mut R,
    ) -> NodeResult<PreparedInput>
    where
        S: DecoySource + ?Sized,
        R: Rng + Send,
    {
        let global_index = source
            .global_output_index(&input.tx_id, input.output_index)
            .await?;
        let real_key = input.one_time_public();
        let (ring, real_position) =
            fetch_ring(source, global_index, &real_key, self.ring_size, rng).await?;
        debug!(
            tx_id = %input.tx_id,
            global_index,
            ring_size = ring.len(),
            "[TX-BUILD] Ring assembled"
        );
        Ok(PreparedInput {
            input,
            ring,
            real_position,
        })
    }

    /// Build and sign. Inputs must cover destinations plus `fee` exactly;
    /// put change in `destinations`.
    ///
    /// # Errors
    ///
    /// [`NodeError::Build`] for unbalanced amounts, bad addresses or output
    /// counts, [`NodeError::Crypto`] from the provers.
    pub fn build<R: RngCore + CryptoRng>(
        &self,
        inputs: Vec<PreparedInput>,
        destinations: &[Destination],
        fee: u64,
        rng: &mut R,
    ) -> NodeResult<BuiltTransaction> {
        self.check_shape(&inputs, destinations, fee)?;

        // Outputs
        let mut tx_secret = random_scalar(rng);
        let tx_public = &tx_secret * ED25519_BASEPOINT_TABLE;
        let mut extra = Extra::new().with(ExtraField::PublicKey(tx_public.compress().to_bytes()));
        let mut planned = Vec::with_capacity(destinations.len());
        let mut payment_id_written = false;

        for (index, destination) in destinations.iter().enumerate() {
            let decoded = decode_address(&destination.address)?;
            if decoded.network != self.network {
                return Err(NodeError::Build(format!(
                    "destination {index} is a {} address, building for {}",
                    decoded.network, self.network
                )));
            }
            if decoded.address_type == AddressType::Subaddress {
                return Err(NodeError::Build(format!(
                    "destination {index} is a subaddress, which is not supported"
                )));
            }
            let spend_public = decompress_prime_order(&decoded.spend_public, "spend_public")?;
            let view_public = decompress_prime_order(&decoded.view_public, "view_public")?;

            let shared = SharedSecret::sender(&tx_secret, &view_public);
            let position = index as u64;
            let mut output_scalar = shared.output_scalar(position);
            let mask = commitment_mask(&output_scalar);

            if let Some(payment_id) = decoded.payment_id {
                if payment_id_written {
                    return Err(NodeError::Build(
                        "more than one integrated destination".into(),
                    ));
                }
                extra = extra.with(ExtraField::Nonce(Nonce::EncryptedPaymentId(
                    encrypt_payment_id(payment_id, &shared),
                )));
                payment_id_written = true;
            }

            planned.push(PlannedOutput {
                target: OutputTarget::TaggedKey {
                    key: one_time_public_key(&output_scalar, &spend_public)
                        .compress()
                        .to_bytes(),
                    view_tag: shared.view_tag(position),
                },
                encrypted_amount: encrypt_amount(destination.amount, &output_scalar),
                commitment: commit(&mask, destination.amount)?,
                mask,
                amount: destination.amount,
            });
            output_scalar.zeroize();
        }
        tx_secret.zeroize();

        // Range proof
        let amounts: Vec<u64> = planned.iter().map(|o| o.amount).collect();
        let masks: Vec<Scalar> = planned.iter().map(|o| o.mask).collect();
        let proof = prove_bulletproof_plus(BpPlusGenerators::shared(), &amounts, &masks, rng)?;
        debug!(
            outputs = planned.len(),
            rounds = proof.rounds(),
            "[TX-BUILD][BP+] Range proof ready"
        );
        let proof_data = BulletproofPlusData {
            a: proof.A.compress().to_bytes(),
            a1: proof.A1.compress().to_bytes(),
            b: proof.B.compress().to_bytes(),
            r1: proof.r1.to_bytes(),
            s1: proof.s1.to_bytes(),
            d1: proof.d1.to_bytes(),
            l: proof.L.iter().map(|p| p.compress().to_bytes()).collect(),
            r: proof.R.iter().map(|p| p.compress().to_bytes()).collect(),
        };

        // Inputs, highest key image first
        let mut sorted: Vec<SortedInput> = inputs
            .into_iter()
            .map(|prepared| {
                let real = prepared.ring[prepared.real_position].key;
                let key_image = compute_key_image(&prepared.input.one_time_secret, &real);
                SortedInput {
                    prepared,
                    key_image,
                }
            })
            .collect();
        sorted.sort_by(|a, b| {
            b.key_image
                .compress()
                .as_bytes()
                .cmp(a.key_image.compress().as_bytes())
        });

        // Pseudo-outputs: masks sum to the output masks so the fee is the
        // only unblinded difference
        let output_mask_sum: Scalar = planned.iter().map(|o| o.mask).sum();
        let mut pseudo_masks: Vec<Scalar> = (1..sorted.len()).map(|_| random_scalar(rng)).collect();
        let partial: Scalar = pseudo_masks.iter().sum();
        pseudo_masks.push(output_mask_sum - partial);

        let pseudo_outs = sorted
            .iter()
            .zip(&pseudo_masks)
            .map(|(input, mask)| commit(mask, input.prepared.input.amount))
            .collect::<Result<Vec<_>, _>>()?;

        let prefix = TransactionPrefix {
            version: 2,
            unlock_time: 0,
            inputs: sorted
                .iter()
                .map(|input| {
                    let absolute: Vec<u64> =
                        input.prepared.ring.iter().map(|m| m.global_index).collect();
                    Ok(TxIn::ToKey {
                        amount: 0,
                        key_offsets: relative_offsets(&absolute)?,
                        key_image: KeyImageBytes::new(input.key_image.compress().to_bytes()),
                    })
                })
                .collect::<NodeResult<Vec<_>>>()?,
            outputs: planned
                .iter()
                .map(|o| TxOut {
                    amount: 0,
                    target: o.target,
                })
                .collect(),
            extra: extra.to_bytes()?,
        };

        let base = RctBase {
            rct_type: RctType::BulletproofPlus,
            fee,
            pseudo_outs: Vec::new(),
            ecdh_info: planned
                .iter()
                .map(|o| EcdhInfo::Compact(o.encrypted_amount))
                .collect(),
            out_pk: planned
                .iter()
                .map(|o| o.commitment.compress().to_bytes())
                .collect(),
        };

        let proofs = RangeProofs::BulletproofPlus(vec![proof_data]);
        let message = clsag_message(&prefix.hash(), &base.to_bytes(), &proofs.key_vector());

        // Signatures
        let mut clsags = Vec::with_capacity(sorted.len());
        for ((input, pseudo_out), pseudo_mask) in sorted.iter().zip(&pseudo_outs).zip(&pseudo_masks)
        {
            let keys: Vec<EdwardsPoint> = input.prepared.ring.iter().map(|m| m.key).collect();
            let commitments: Vec<EdwardsPoint> =
                input.prepared.ring.iter().map(|m| m.commitment).collect();
            let ring = ClsagRing {
                keys: &keys,
                commitments: &commitments,
                pseudo_out: *pseudo_out,
            };
            let mut mask_delta = input.prepared.input.mask - pseudo_mask;
            let signed = sign_clsag(
                &message,
                &ring,
                input.prepared.real_position,
                &input.prepared.input.one_time_secret,
                &mask_delta,
                rng,
            );
            mask_delta.zeroize();
            let signed = signed?;
            clsags.push(ClsagData {
                s: signed.signature.s.iter().map(Scalar::to_bytes).collect(),
                c1: signed.signature.c1.to_bytes(),
                d: signed.signature.D.compress().to_bytes(),
            });
        }
        for mask in &mut pseudo_masks {
            mask.zeroize();
        }
        debug!(inputs = clsags.len(), "[TX-BUILD][CLSAG] Inputs signed");

        let transaction = Transaction {
            prefix,
            signatures: TxSignatures::Rct {
                base,
                prunable: Some(RctPrunable::Clsag {
                    proofs,
                    clsags,
                    pseudo_outs: pseudo_outs
                        .iter()
                        .map(|p| p.compress().to_bytes())
                        .collect(),
                }),
            },
        };
        let blob = transaction.to_bytes();
        let tx_id = transaction.id()?;

        info!(
            tx_id = %tx_id,
            inputs = sorted.len(),
            outputs = planned.len(),
            fee = %format_atomic(fee),
            bytes = blob.len(),
            "[TX-BUILD] Transaction built"
        );

        Ok(BuiltTransaction {
            key_images: sorted
                .iter()
                .map(|i| KeyImageBytes::new(i.key_image.compress().to_bytes()))
                .collect(),
            transaction,
            blob,
            tx_id,
            fee,
        })
    }

    fn check_shape(
        &self,
        inputs: &[PreparedInput],
        destinations: &[Destination],
        fee: u64,
    ) -> NodeResult<()> {
        if inputs.is_empty() {
            return Err(NodeError::Build("no inputs".into()));
        }
        if destinations.is_empty() || destinations.len() > MAX_OUTPUTS {
            return Err(NodeError::Build(format!(
                "{} destinations, expected 1 to {MAX_OUTPUTS}",
                destinations.len()
            )));
        }
        for (index, input) in inputs.iter().enumerate() {
            if input.real_position >= input.ring.len() {
                return Err(NodeError::Build(format!(
                    "input {index} real position {} outside ring of {}",
                    input.real_position,
                    input.ring.len()
                )));
            }
            if input.ring[input.real_position].key != input.input.one_time_public() {
                return Err(NodeError::Build(format!(
                    "input {index} ring does not contain its one-time key"
                )));
            }
        }

        let total_in = checked_sum(inputs.iter().map(|i| i.input.amount), "inputs")?;
        let total_out = checked_sum(
            destinations.iter().map(|d| d.amount).chain([fee]),
            "outputs plus fee",
        )?;
        if total_in != total_out {
            return Err(NodeError::Build(format!(
                "inputs {} do not equal outputs plus fee {}",
                format_atomic(total_in),
                format_atomic(total_out)
            )));
        }
        Ok(())
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = u64>, what: &str) -> NodeResult<u64> {
    amounts
        .try_fold(0u64, u64::checked_add)
        .ok_or_else(|| NodeError::Build(format!("{what} overflow")))
}

/// XOR an integrated-address payment id with `Keccak(D || 0x8d)`.
fn encrypt_payment_id(payment_id: [u8; 8], shared: &SharedSecret) -> [u8; 8] {
    let key = keccak256_parts(&[shared.as_bytes(), &[ENCRYPTED_PAYMENT_ID_TAIL]]);
    let mut out = payment_id;
    for (byte, k) in out.iter_mut().zip(key.iter()) {
        *byte ^= k;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use umbra_crypto_core::encode_address;

    fn address(rng: &mut StdRng, network: Network, kind: AddressType) -> String {
        let spend = &random_scalar(rng) * ED25519_BASEPOINT_TABLE;
        let view = &random_scalar(rng) * ED25519_BASEPOINT_TABLE;
        encode_address(
            network,
            kind,
            &spend.compress().to_bytes(),
            &view.compress().to_bytes(),
            Some(&[7u8; 8]),
        )
    }

    fn prepared(rng: &mut StdRng, amount: u64, ring_size: usize) -> PreparedInput {
        let input = SpendableInput {
            one_time_secret: random_scalar(rng),
            mask: random_scalar(rng),
            amount,
            tx_id: TxId::new([3; 32]),
            output_index: 0,
        };
        let real_position = ring_size / 2;
        let ring = (0..ring_size)
            .map(|i| {
                if i == real_position {
                    RingMember {
                        global_index: 1_000,
                        key: input.one_time_public(),
                        commitment: commit(&input.mask, amount).unwrap(),
                    }
                } else {
                    let offset = i as u64;
                    RingMember {
                        global_index: if i < real_position {
                            900 + offset
                        } else {
                            1_100 + offset
                        },
                        key: &random_scalar(rng) * ED25519_BASEPOINT_TABLE,
                        commitment: &random_scalar(rng) * ED25519_BASEPOINT_TABLE,
                    }
                }
            })
            .collect();
        PreparedInput {
            input,
            ring,
            real_position,
        }
    }

    #[test]
    fn test_unbalanced_rejected() {
        let mut rng = StdRng::seed_from_u64(21);
        let to = address(&mut rng, Network::Mainnet, AddressType::Standard);
        let builder = TransactionBuilder::new(Network::Mainnet).with_ring_size(4);
        let result = builder.build(
            vec![prepared(&mut rng, 1_000, 4)],
            &[Destination {
                address: to,
                amount: 900,
            }],
            50,
            &mut rng,
        );
        assert!(matches!(result, Err(NodeError::Build(_))));
    }

    #[test]
    fn test_subaddress_rejected() {
        let mut rng = StdRng::seed_from_u64(22);
        let to = address(&mut rng, Network::Mainnet, AddressType::Subaddress);
        let builder = TransactionBuilder::new(Network::Mainnet);
        let result = builder.build(
            vec![prepared(&mut rng, 1_000, 4)],
            &[Destination {
                address: to,
                amount: 950,
            }],
            50,
            &mut rng,
        );
        assert!(matches!(result, Err(NodeError::Build(_))));
    }

    #[test]
    fn test_wrong_network_rejected() {
        let mut rng = StdRng::seed_from_u64(23);
        let to = address(&mut rng, Network::Stagenet, AddressType::Standard);
        let result = TransactionBuilder::new(Network::Mainnet).build(
            vec![prepared(&mut rng, 1_000, 4)],
            &[Destination {
                address: to,
                amount: 950,
            }],
            50,
            &mut rng,
        );
        assert!(matches!(result, Err(NodeError::Build(_))));
    }

    #[test]
    fn test_builds_balanced_spend() {
        let mut rng = StdRng::seed_from_u64(24);
        let to = address(&mut rng, Network::Mainnet, AddressType::Standard);
        let change = address(&mut rng, Network::Mainnet, AddressType::Integrated);
        let built = TransactionBuilder::new(Network::Mainnet)
            .build(
                vec![prepared(&mut rng, 600, 4), prepared(&mut rng, 500, 4)],
                &[
                    Destination {
                        address: to,
                        amount: 1_000,
                    },
                    Destination {
                        address: change,
                        amount: 70,
                    },
                ],
                30,
                &mut rng,
            )
            .unwrap();

        let parsed = Transaction::parse(&built.blob).unwrap();
        assert_eq!(parsed, built.transaction);
        assert_eq!(parsed.id().unwrap(), built.tx_id);
        assert_eq!(parsed.prefix.inputs.len(), 2);
        assert_eq!(parsed.prefix.outputs.len(), 2);
        assert_eq!(parsed.rct_base().unwrap().fee, 30);
        assert!(parsed.prefix.parsed_extra().encrypted_payment_id().is_some());

        let images: Vec<[u8; 32]> = built.key_images.iter().map(|k| k.to_bytes()).collect();
        assert!(images[0] > images[1]);
    }

    #[test]
    fn test_payment_id_encryption_is_involution() {
        let mut rng = StdRng::seed_from_u64(25);
        let r = random_scalar(&mut rng);
        let view = &random_scalar(&mut rng) * ED25519_BASEPOINT_TABLE;
        let shared = SharedSecret::sender(&r, &view);
        let pid = [1, 2, 3, 4, 5, 6, 7, 8];
        let once = encrypt_payment_id(pid, &shared);
        assert_ne!(once, pid);
        assert_eq!(encrypt_payment_id(once, &shared), pid);
    }

    #[test]
    fn test_checked_sum_rejects_overflow() {
        assert_eq!(checked_sum([40u64, 2].into_iter(), "outputs").unwrap(), 42);
        let err = checked_sum([u64::MAX, 1].into_iter(), "outputs").unwrap_err();
        assert!(matches!(err, NodeError::Build(ref m) if m == "outputs overflow"));
    }
}
