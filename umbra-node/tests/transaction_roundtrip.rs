//! Build a spend against a fake daemon, parse it back, verify its
//! signatures and scan it as the recipient; then spend the received output
//! again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use rand::rngs::StdRng;
use rand::SeedableRng;
use umbra_crypto_core::{
    commit, decompress_point, encode_address, random_scalar, verify_clsag, AddressType,
    ClsagRing, ClsagSignature, EdwardsPoint, Scalar, ScanKeys,
};
use umbra_node::builder::PreparedInput;
use umbra_node::{
    AmountStatus, BuiltTransaction, DecoySource, Destination, NodeError, NodeResult, RingMember,
    Scanner, SpendableInput, TransactionBuilder,
};
use umbra_types::{Network, TxId};
use umbra_wire::tx::{RctPrunable, TxIn, TxSignatures};
use umbra_wire::Transaction;

const RING_SIZE: usize = 11;

type Rings = HashMap<Vec<u64>, (Vec<EdwardsPoint>, Vec<EdwardsPoint>)>;

/// In-memory daemon: 2000 blocks of 10 outputs, with registered real
/// outputs and synthetic decoys everywhere else.
struct FakeDaemon {
    distribution: Vec<u64>,
    indices: HashMap<(TxId, usize), u64>,
    outputs: HashMap<u64, RingMember>,
}

impl FakeDaemon {
    fn new() -> Self {
        Self {
            distribution: (1..=2_000u64).map(|b| b * 10).collect(),
            indices: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    fn register(&mut self, input: &SpendableInput, global_index: u64) {
        self.register_key(input, global_index, input.one_time_public());
    }

    fn register_key(&mut self, input: &SpendableInput, global_index: u64, key: EdwardsPoint) {
        self.indices
            .insert((input.tx_id, input.output_index), global_index);
        self.outputs.insert(
            global_index,
            RingMember {
                global_index,
                key,
                commitment: commit(&input.mask, input.amount).unwrap(),
            },
        );
    }
}

fn decoy(global_index: u64) -> RingMember {
    RingMember {
        global_index,
        key: &Scalar::from(global_index + 1) * ED25519_BASEPOINT_TABLE,
        commitment: &Scalar::from(global_index + 1_000_003) * ED25519_BASEPOINT_TABLE,
    }
}

#[async_trait]
impl DecoySource for FakeDaemon {
    async fn global_output_index(&self, tx_id: &TxId, vout: usize) -> NodeResult<u64> {
        self.indices.get(&(*tx_id, vout)).copied().ok_or_else(|| {
            NodeError::DecoySelectionUnavailable(format!("unknown output {tx_id}:{vout}"))
        })
    }

    async fn output_distribution(&self) -> NodeResult<Vec<u64>> {
        Ok(self.distribution.clone())
    }

    async fn fetch_outputs(&self, indices: &[u64]) -> NodeResult<Vec<RingMember>> {
        Ok(indices
            .iter()
            .map(|&i| self.outputs.get(&i).copied().unwrap_or_else(|| decoy(i)))
            .collect())
    }
}

fn random_point(rng: &mut StdRng) -> EdwardsPoint {
    &random_scalar(rng) * ED25519_BASEPOINT_TABLE
}

fn address_of(view_secret: &Scalar, spend_secret: &Scalar) -> String {
    let spend = spend_secret * ED25519_BASEPOINT_TABLE;
    let view = view_secret * ED25519_BASEPOINT_TABLE;
    encode_address(
        Network::Mainnet,
        AddressType::Standard,
        &spend.compress().to_bytes(),
        &view.compress().to_bytes(),
        None,
    )
}

fn builder() -> TransactionBuilder {
    TransactionBuilder::new(Network::Mainnet).with_ring_size(RING_SIZE)
}

fn fresh_input(rng: &mut StdRng, amount: u64, tx_byte: u8) -> SpendableInput {
    SpendableInput {
        one_time_secret: random_scalar(rng),
        mask: random_scalar(rng),
        amount,
        tx_id: TxId::new([tx_byte; 32]),
        output_index: 0,
    }
}

/// Ring the input through the daemon and remember the ring for verification.
async fn prepare(
    daemon: &FakeDaemon,
    rng: &mut StdRng,
    input: SpendableInput,
    rings: &mut Rings,
) -> PreparedInput {
    let prepared = builder().prepare_input(daemon, input, rng).await.unwrap();
    assert_eq!(prepared.ring.len(), RING_SIZE);
    let real = &prepared.ring[prepared.real_position];
    assert_eq!(real.key, prepared.input.one_time_public());
    rings.insert(
        prepared.ring.iter().map(|m| m.global_index).collect(),
        (
            prepared.ring.iter().map(|m| m.key).collect(),
            prepared.ring.iter().map(|m| m.commitment).collect(),
        ),
    );
    prepared
}

fn verify_signatures(built: &BuiltTransaction, rings: &Rings) {
    let parsed = Transaction::parse(&built.blob).unwrap();
    assert_eq!(parsed, built.transaction);
    assert_eq!(parsed.id().unwrap(), built.tx_id);

    let message = parsed.clsag_message().unwrap();
    let TxSignatures::Rct {
        prunable: Some(RctPrunable::Clsag {
            clsags, pseudo_outs, ..
        }),
        ..
    } = &parsed.signatures
    else {
        panic!("expected CLSAG proofs");
    };
    assert_eq!(clsags.len(), parsed.prefix.inputs.len());

    for ((input, data), pseudo_out) in parsed.prefix.inputs.iter().zip(clsags).zip(pseudo_outs) {
        let TxIn::ToKey { key_image, .. } = input else {
            panic!("expected a key input");
        };
        let absolute = input.absolute_offsets().unwrap();
        let (keys, commitments) = &rings[&absolute];
        let ring = ClsagRing {
            keys,
            commitments,
            pseudo_out: decompress_point(pseudo_out, "pseudo_out").unwrap(),
        };
        let signature = ClsagSignature {
            s: data
                .s
                .iter()
                .map(|s| Option::from(Scalar::from_canonical_bytes(*s)).unwrap())
                .collect(),
            c1: Option::from(Scalar::from_canonical_bytes(data.c1)).unwrap(),
            D: decompress_point(&data.d, "D").unwrap(),
        };
        let image = decompress_point(key_image.as_bytes(), "key_image").unwrap();
        verify_clsag(&message, &ring, &signature, &image).unwrap();
    }
}

#[tokio::test]
async fn test_spend_scan_and_respend() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut rings = Rings::new();
    let mut daemon = FakeDaemon::new();

    let recipient_view = random_scalar(&mut rng);
    let recipient_spend = random_scalar(&mut rng);
    let recipient = address_of(&recipient_view, &recipient_spend);
    let change = address_of(&random_scalar(&mut rng), &random_scalar(&mut rng));

    let funding = fresh_input(&mut rng, 1_030_000, 1);
    daemon.register(&funding, 5_000);
    let prepared = prepare(&daemon, &mut rng, funding, &mut rings).await;
    assert_eq!(prepared.ring[prepared.real_position].global_index, 5_000);

    let built = builder()
        .build(
            vec![prepared],
            &[
                Destination {
                    address: recipient,
                    amount: 1_000_000,
                },
                Destination {
                    address: change,
                    amount: 20_000,
                },
            ],
            10_000,
            &mut rng,
        )
        .unwrap();
    verify_signatures(&built, &rings);

    // Recipient side
    let scanner = Scanner::new(Arc::new(ScanKeys::with_spend_secret(
        recipient_view,
        recipient_spend,
    )));
    let parsed = Transaction::parse(&built.blob).unwrap();
    let outcome = scanner.scan_transaction(&parsed);
    assert_eq!(outcome.outputs.len(), 1);
    assert_eq!(outcome.confirmed_total(), 1_000_000);
    let owned = &outcome.outputs[0];
    assert_eq!(owned.output_index, 0);
    assert_eq!(owned.status, AmountStatus::Confirmed);
    assert_eq!(owned.tx_id, Some(built.tx_id));
    assert!(owned.is_spendable());

    let stranger = Scanner::new(Arc::new(ScanKeys::with_spend_secret(
        random_scalar(&mut rng),
        random_scalar(&mut rng),
    )));
    assert!(stranger.scan_transaction(&parsed).is_empty());

    // Spend the received output once the daemon has indexed it
    let respend = SpendableInput::from_owned(owned).unwrap();
    assert_eq!(respend.tx_id, built.tx_id);
    daemon.register(&respend, 15_000);
    let prepared = prepare(&daemon, &mut rng, respend, &mut rings).await;
    let onward = address_of(&random_scalar(&mut rng), &random_scalar(&mut rng));
    let second = builder()
        .build(
            vec![prepared],
            &[Destination {
                address: onward,
                amount: 990_000,
            }],
            10_000,
            &mut rng,
        )
        .unwrap();
    verify_signatures(&second, &rings);
    assert_eq!(Some(second.key_images[0]), owned.key_image);
}

#[tokio::test]
async fn test_two_inputs_sorted_by_key_image() {
    let mut rng = StdRng::seed_from_u64(77);
    let mut rings = Rings::new();
    let mut daemon = FakeDaemon::new();

    let mut inputs = Vec::new();
    for (amount, global_index, tx_byte) in [(400_000, 2_000, 4), (700_000, 8_000, 5)] {
        let input = fresh_input(&mut rng, amount, tx_byte);
        daemon.register(&input, global_index);
        inputs.push(prepare(&daemon, &mut rng, input, &mut rings).await);
    }
    let to = address_of(&random_scalar(&mut rng), &random_scalar(&mut rng));

    let built = builder()
        .build(
            inputs,
            &[Destination {
                address: to,
                amount: 1_090_000,
            }],
            10_000,
            &mut rng,
        )
        .unwrap();

    assert_eq!(built.key_images.len(), 2);
    assert!(built.key_images[0].as_bytes() > built.key_images[1].as_bytes());
    verify_signatures(&built, &rings);
}

#[tokio::test]
async fn test_unindexed_output_is_decoy_error() {
    let mut rng = StdRng::seed_from_u64(5);
    let daemon = FakeDaemon::new();
    let input = fresh_input(&mut rng, 1_000, 6);
    let result = builder().prepare_input(&daemon, input, &mut rng).await;
    assert!(matches!(result, Err(NodeError::DecoySelectionUnavailable(_))));
}

#[tokio::test]
async fn test_daemon_key_mismatch_rejected() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut daemon = FakeDaemon::new();
    let input = fresh_input(&mut rng, 1_000, 7);
    let wrong_key = random_point(&mut rng);
    daemon.register_key(&input, 3_000, wrong_key);
    let result = builder().prepare_input(&daemon, input, &mut rng).await;
    assert!(matches!(result, Err(NodeError::DecoySelectionUnavailable(_))));
}

#[tokio::test]
async fn test_young_chain_cannot_ring() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut daemon = FakeDaemon::new();
    daemon.distribution.truncate(5);
    let input = fresh_input(&mut rng, 1_000, 9);
    daemon.register(&input, 2);
    let result = builder().prepare_input(&daemon, input, &mut rng).await;
    assert!(matches!(result, Err(NodeError::DecoySelectionUnavailable(_))));
}
