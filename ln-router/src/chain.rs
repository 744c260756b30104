// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The seam between the routing core and whatever watches the chain for us.

use std::fmt;

use async_trait::async_trait;
use bitcoin::blockdata::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2};
use bitcoin::blockdata::script::Builder;
use bitcoin::{PublicKey, ScriptBuf};

use crate::error::RouterError;
use crate::types::{NodeId, ShortChannelId};

/// The funding output referenced by a short channel id.
pub struct FundingOutput {
	pub script_pubkey: ScriptBuf,
	pub value_sat: u64,
}

#[derive(Debug)]
pub enum ChainSourceError {
	/// The referenced output does not exist (yet) in the chain view.
	NotFound,
	/// The lookup failed for a reason unrelated to the output itself, e.g.
	/// the backing server being unreachable. Worth retrying.
	Transient(String),
}

impl fmt::Display for ChainSourceError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ChainSourceError::NotFound => write!(f, "funding output not found"),
			ChainSourceError::Transient(msg) => write!(f, "transient chain lookup failure: {}", msg),
		}
	}
}

impl std::error::Error for ChainSourceError {}

/// Resolves short channel ids to their funding outputs.
///
/// Implemented outside this crate by the wallet's chain backend (Electrum
/// server, bitcoind RPC, ...).
#[async_trait]
pub trait ChainSource: Send + Sync {
	async fn funding_output(
		&self, short_channel_id: ShortChannelId,
	) -> Result<FundingOutput, ChainSourceError>;
}

/// The scriptPubKey an announced channel's funding output must carry: a
/// P2WSH wrapping the 2-of-2 multisig over the (already byte-ordered)
/// endpoint keys.
pub fn expected_funding_script(node1: &NodeId, node2: &NodeId) -> Result<ScriptBuf, RouterError> {
	let key1 = PublicKey::new(node1.as_pubkey().map_err(|_| RouterError::InvalidSignature)?);
	let key2 = PublicKey::new(node2.as_pubkey().map_err(|_| RouterError::InvalidSignature)?);
	let witness_script = Builder::new()
		.push_opcode(OP_PUSHNUM_2)
		.push_key(&key1)
		.push_key(&key2)
		.push_opcode(OP_PUSHNUM_2)
		.push_opcode(OP_CHECKMULTISIG)
		.into_script();
	Ok(ScriptBuf::new_p2wsh(&witness_script.wscript_hash()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use bitcoin::secp256k1::{Secp256k1, SecretKey};

	fn node_id(byte: u8) -> NodeId {
		let secp = Secp256k1::new();
		let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
		NodeId::from_pubkey(&sk.public_key(&secp))
	}

	#[test]
	fn funding_script_is_p2wsh() {
		let script = expected_funding_script(&node_id(1), &node_id(2)).unwrap();
		assert!(script.is_p2wsh());
	}

	#[test]
	fn funding_script_depends_on_key_order() {
		let a = node_id(1);
		let b = node_id(2);
		assert_ne!(
			expected_funding_script(&a, &b).unwrap(),
			expected_funding_script(&b, &a).unwrap()
		);
	}

	#[test]
	fn funding_script_rejects_garbage_keys() {
		let bogus = NodeId::from_array([0xff; 33]);
		assert!(expected_funding_script(&bogus, &node_id(2)).is_err());
	}
}
