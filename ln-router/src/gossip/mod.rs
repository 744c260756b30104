// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Parsed gossip payloads and their signature checks.
//!
//! Wire deserialisation happens outside this crate; the gossip transport
//! hands us these structs together with the raw message bytes. The raw bytes
//! are kept because signatures cover the serialised form and because channel
//! announcements are retained verbatim in the database.

pub mod address;
pub mod features;

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, Secp256k1, Verification};
use bitcoin::BlockHash;

use crate::error::RouterError;
use crate::types::{NodeId, ShortChannelId};

/// `channel_update` and `node_announcement` signatures cover the double-SHA256
/// of the message past the 2-byte type and single 64-byte signature.
pub const SINGLE_SIG_SIGNED_OFFSET: usize = 66;

/// `channel_announcement` carries two node signatures before the signed part.
pub const CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET: usize = 130;

/// A parsed `channel_announcement`, plus the raw message it came from.
#[derive(Clone, Debug)]
pub struct ChannelAnnouncement {
	pub node_signature_1: Signature,
	pub node_signature_2: Signature,
	pub features: u64,
	pub chain_hash: BlockHash,
	pub short_channel_id: ShortChannelId,
	pub node_id_1: NodeId,
	pub node_id_2: NodeId,
	pub raw: Vec<u8>,
}

/// A parsed `channel_update`, plus the raw message it came from.
#[derive(Clone, Debug)]
pub struct ChannelUpdate {
	pub signature: Signature,
	pub chain_hash: BlockHash,
	pub short_channel_id: ShortChannelId,
	pub timestamp: u32,
	pub channel_flags: u8,
	pub cltv_expiry_delta: u16,
	pub htlc_minimum_msat: u64,
	pub htlc_maximum_msat: Option<u64>,
	pub fee_base_msat: u32,
	pub fee_proportional_millionths: u32,
	pub raw: Vec<u8>,
}

/// A parsed `node_announcement`, plus the raw message it came from.
#[derive(Clone, Debug)]
pub struct NodeAnnouncement {
	pub signature: Signature,
	pub features: u64,
	pub timestamp: u32,
	pub node_id: NodeId,
	pub alias: [u8; 32],
	/// The packed address field, decoded via [`address::parse_address_field`].
	pub addresses: Vec<u8>,
	pub raw: Vec<u8>,
}

/// Double-SHA256 of the signed part of a raw gossip message.
pub(crate) fn signed_msg_hash(raw: &[u8], offset: usize) -> Result<Message, RouterError> {
	if raw.len() <= offset {
		return Err(RouterError::InvalidSignature);
	}
	let hash = sha256d::Hash::hash(&raw[offset..]);
	Ok(Message::from_digest(hash.to_byte_array()))
}

/// Verifies `signature` over the signed part of `raw` against `node_id`.
pub(crate) fn verify_node_signature<C: Verification>(
	secp: &Secp256k1<C>, raw: &[u8], offset: usize, signature: &Signature, node_id: &NodeId,
) -> Result<(), RouterError> {
	let msg = signed_msg_hash(raw, offset)?;
	let pubkey = node_id.as_pubkey().map_err(|_| RouterError::InvalidSignature)?;
	secp.verify_ecdsa(&msg, signature, &pubkey).map_err(|_| RouterError::InvalidSignature)
}

#[cfg(test)]
mod tests {
	use super::*;
	use bitcoin::secp256k1::SecretKey;

	#[test]
	fn signature_round_trip() {
		let secp = Secp256k1::new();
		let sk = SecretKey::from_slice(&[0x42; 32]).unwrap();
		let node_id = NodeId::from_pubkey(&sk.public_key(&secp));

		let mut raw = vec![0u8; SINGLE_SIG_SIGNED_OFFSET];
		raw.extend_from_slice(b"signed announcement body");
		let msg = signed_msg_hash(&raw, SINGLE_SIG_SIGNED_OFFSET).unwrap();
		let signature = secp.sign_ecdsa(&msg, &sk);

		assert!(verify_node_signature(&secp, &raw, SINGLE_SIG_SIGNED_OFFSET, &signature, &node_id)
			.is_ok());

		let mut tampered = raw.clone();
		*tampered.last_mut().unwrap() ^= 1;
		assert!(matches!(
			verify_node_signature(
				&secp,
				&tampered,
				SINGLE_SIG_SIGNED_OFFSET,
				&signature,
				&node_id
			),
			Err(RouterError::InvalidSignature)
		));
	}

	#[test]
	fn short_raw_message_is_invalid() {
		let secp = Secp256k1::new();
		let sk = SecretKey::from_slice(&[0x42; 32]).unwrap();
		let node_id = NodeId::from_pubkey(&sk.public_key(&secp));
		let signature = secp.sign_ecdsa(&Message::from_digest([0u8; 32]), &sk);

		let raw = vec![0u8; SINGLE_SIG_SIGNED_OFFSET];
		assert!(matches!(
			verify_node_signature(&secp, &raw, SINGLE_SIG_SIGNED_OFFSET, &signature, &node_id),
			Err(RouterError::InvalidSignature)
		));
	}
}
