#![allow(dead_code)]

//! Shared fixtures: deterministic keys, signed gossip payloads and mocks for
//! the chain source and the event bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::blockdata::constants::genesis_block;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::Network;

use ln_router::chain::{ChainSource, ChainSourceError, FundingOutput};
use ln_router::events::{Event, EventPublisher};
use ln_router::gossip::{
	ChannelAnnouncement, ChannelUpdate, NodeAnnouncement, CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET,
	SINGLE_SIG_SIGNED_OFFSET,
};
use ln_router::routing::RouteEdge;
use ln_router::{GraphStore, NodeId, ShortChannelId};

pub const TEST_NETWORK: Network = Network::Regtest;

pub fn test_chain_hash() -> bitcoin::BlockHash {
	genesis_block(TEST_NETWORK).block_hash()
}

pub fn keypair(byte: u8) -> (SecretKey, NodeId) {
	let secp = Secp256k1::new();
	let sk = SecretKey::from_slice(&[byte; 32]).expect("non-zero byte");
	(sk, NodeId::from_pubkey(&sk.public_key(&secp)))
}

/// Two keypairs ordered so the first holds the smaller node id.
pub fn sorted_keypairs(a: u8, b: u8) -> ((SecretKey, NodeId), (SecretKey, NodeId)) {
	let (ka, kb) = (keypair(a), keypair(b));
	if ka.1 < kb.1 {
		(ka, kb)
	} else {
		(kb, ka)
	}
}

fn placeholder_sig() -> Signature {
	let secp = Secp256k1::new();
	let sk = SecretKey::from_slice(&[0x55; 32]).unwrap();
	secp.sign_ecdsa(&Message::from_digest([0x55; 32]), &sk)
}

/// Builds a `channel_announcement` whose raw bytes and signatures are
/// consistent. With `signed` false the signatures are placeholders, which is
/// fine for trusted ingestion.
pub fn channel_announcement(
	scid: u64, key1: &(SecretKey, NodeId), key2: &(SecretKey, NodeId), features: u64,
	signed: bool,
) -> ChannelAnnouncement {
	let secp = Secp256k1::new();
	let ((sk1, node1), (sk2, node2)) =
		if key1.1 < key2.1 { (*key1, *key2) } else { (*key2, *key1) };
	let chain_hash = test_chain_hash();

	let mut raw = vec![0u8; CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET];
	raw[0] = 0x01; // message type 256
	raw.extend_from_slice(&features.to_be_bytes());
	raw.extend_from_slice(&chain_hash.to_byte_array());
	raw.extend_from_slice(&scid.to_be_bytes());
	raw.extend_from_slice(node1.as_slice());
	raw.extend_from_slice(node2.as_slice());

	let (node_signature_1, node_signature_2) = if signed {
		let digest = sha256d::Hash::hash(&raw[CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET..]);
		let msg = Message::from_digest(digest.to_byte_array());
		(secp.sign_ecdsa(&msg, &sk1), secp.sign_ecdsa(&msg, &sk2))
	} else {
		(placeholder_sig(), placeholder_sig())
	};
	raw[2..66].copy_from_slice(&node_signature_1.serialize_compact());
	raw[66..130].copy_from_slice(&node_signature_2.serialize_compact());

	ChannelAnnouncement {
		node_signature_1,
		node_signature_2,
		features,
		chain_hash,
		short_channel_id: ShortChannelId::new(scid),
		node_id_1: node1,
		node_id_2: node2,
		raw,
	}
}

/// The knobs of a `channel_update` a test may care about.
pub struct UpdateParams {
	pub scid: u64,
	/// 0 applies the policy to the smaller node id, 1 to the larger.
	pub direction: u8,
	pub timestamp: u32,
	pub cltv_expiry_delta: u16,
	pub htlc_minimum_msat: u64,
	pub htlc_maximum_msat: Option<u64>,
	pub fee_base_msat: u32,
	pub fee_proportional_millionths: u32,
	pub disabled: bool,
}

impl Default for UpdateParams {
	fn default() -> Self {
		UpdateParams {
			scid: 0,
			direction: 0,
			timestamp: 1,
			cltv_expiry_delta: 40,
			htlc_minimum_msat: 0,
			htlc_maximum_msat: None,
			fee_base_msat: 0,
			fee_proportional_millionths: 0,
			disabled: false,
		}
	}
}

/// Builds a `channel_update`; signed with `signing_key` when given, with a
/// placeholder signature (trusted ingestion only) otherwise.
pub fn channel_update(spec: &UpdateParams, signing_key: Option<&SecretKey>) -> ChannelUpdate {
	let secp = Secp256k1::new();
	let chain_hash = test_chain_hash();
	let channel_flags = spec.direction | if spec.disabled { 0b10 } else { 0 };

	let mut raw = vec![0u8; SINGLE_SIG_SIGNED_OFFSET];
	raw[0] = 0x01;
	raw[1] = 0x02; // message type 258
	raw.extend_from_slice(&chain_hash.to_byte_array());
	raw.extend_from_slice(&spec.scid.to_be_bytes());
	raw.extend_from_slice(&spec.timestamp.to_be_bytes());
	raw.push(channel_flags);
	raw.extend_from_slice(&spec.cltv_expiry_delta.to_be_bytes());
	raw.extend_from_slice(&spec.htlc_minimum_msat.to_be_bytes());
	raw.extend_from_slice(&spec.fee_base_msat.to_be_bytes());
	raw.extend_from_slice(&spec.fee_proportional_millionths.to_be_bytes());
	if let Some(max) = spec.htlc_maximum_msat {
		raw.extend_from_slice(&max.to_be_bytes());
	}

	let signature = match signing_key {
		Some(sk) => {
			let digest = sha256d::Hash::hash(&raw[SINGLE_SIG_SIGNED_OFFSET..]);
			secp.sign_ecdsa(&Message::from_digest(digest.to_byte_array()), sk)
		},
		None => placeholder_sig(),
	};
	raw[2..66].copy_from_slice(&signature.serialize_compact());

	ChannelUpdate {
		signature,
		chain_hash,
		short_channel_id: ShortChannelId::new(spec.scid),
		timestamp: spec.timestamp,
		channel_flags,
		cltv_expiry_delta: spec.cltv_expiry_delta,
		htlc_minimum_msat: spec.htlc_minimum_msat,
		htlc_maximum_msat: spec.htlc_maximum_msat,
		fee_base_msat: spec.fee_base_msat,
		fee_proportional_millionths: spec.fee_proportional_millionths,
		raw,
	}
}

/// Builds a `node_announcement` for `identity`, signed by `signer` (pass the
/// same key for a valid message).
pub fn node_announcement(
	identity: &(SecretKey, NodeId), signer: &SecretKey, timestamp: u32, features: u64,
	alias: &str, addresses: Vec<u8>,
) -> NodeAnnouncement {
	let secp = Secp256k1::new();
	let mut alias_bytes = [0u8; 32];
	alias_bytes[..alias.len()].copy_from_slice(alias.as_bytes());

	let mut raw = vec![0u8; SINGLE_SIG_SIGNED_OFFSET];
	raw[0] = 0x01;
	raw[1] = 0x01; // message type 257
	raw.extend_from_slice(&features.to_be_bytes());
	raw.extend_from_slice(&timestamp.to_be_bytes());
	raw.extend_from_slice(identity.1.as_slice());
	raw.extend_from_slice(&alias_bytes);
	raw.extend_from_slice(&addresses);

	let digest = sha256d::Hash::hash(&raw[SINGLE_SIG_SIGNED_OFFSET..]);
	let signature = secp.sign_ecdsa(&Message::from_digest(digest.to_byte_array()), signer);
	raw[2..66].copy_from_slice(&signature.serialize_compact());

	NodeAnnouncement {
		signature,
		features,
		timestamp,
		node_id: identity.1,
		alias: alias_bytes,
		addresses,
		raw,
	}
}

pub fn open_store(path: &std::path::Path) -> Arc<GraphStore> {
	Arc::new(GraphStore::open(path, TEST_NETWORK, None).unwrap())
}

/// Inserts a trusted (already verified) channel between two keypairs.
pub fn add_channel(
	store: &GraphStore, scid: u64, key1: &(SecretKey, NodeId), key2: &(SecretKey, NodeId),
) {
	store.on_channel_announcement(&channel_announcement(scid, key1, key2, 0, false), true).unwrap();
}

/// Applies a trusted `channel_update`.
pub fn apply_policy(store: &GraphStore, spec: UpdateParams) {
	store.on_channel_update(&channel_update(&spec, None), true).unwrap();
}

/// The amount the sender ends up paying for a route: the invoice amount plus
/// every hop's fee on the amount it carries, accumulated from the payee end.
pub fn total_sender_amount(route: &[RouteEdge], invoice_amount_msat: u64) -> u64 {
	route.iter().rev().fold(invoice_amount_msat, |amount, edge| {
		amount + edge.fee_for_amount(amount)
	})
}

/// Event publisher capturing everything it sees.
#[derive(Default)]
pub struct TestPublisher {
	pub events: Mutex<Vec<Event>>,
}

impl EventPublisher for TestPublisher {
	fn publish(&self, event: Event) {
		self.events.lock().unwrap().push(event);
	}
}

/// Chain source answering from a scripted queue of responses per channel.
#[derive(Default)]
pub struct MockChainSource {
	responses: Mutex<HashMap<u64, Vec<Result<FundingOutput, ChainSourceError>>>>,
	pub lookups: Mutex<usize>,
}

impl MockChainSource {
	/// Queues `response` as the next answer for `scid`.
	pub fn push_response(&self, scid: u64, response: Result<FundingOutput, ChainSourceError>) {
		self.responses.lock().unwrap().entry(scid).or_default().push(response);
	}
}

#[async_trait]
impl ChainSource for MockChainSource {
	async fn funding_output(
		&self, short_channel_id: ShortChannelId,
	) -> Result<FundingOutput, ChainSourceError> {
		*self.lookups.lock().unwrap() += 1;
		let mut responses = self.responses.lock().unwrap();
		let queue = responses.entry(short_channel_id.as_u64()).or_default();
		if queue.is_empty() {
			return Err(ChainSourceError::Transient("no scripted response".to_string()));
		}
		queue.remove(0)
	}
}
