// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Identifier types shared between the gossip layer, the graph store and the
//! path finder.

use std::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::PublicKey;
use hex::{DisplayHex, FromHex, HexToArrayError};

/// The 33-byte compressed secp256k1 public key identifying a Lightning node.
///
/// Ordering is byte-lexicographic, which is the ordering the gossip protocol
/// uses to decide which endpoint of a channel is `node1`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId([u8; 33]);

impl NodeId {
	pub fn from_pubkey(pubkey: &PublicKey) -> Self {
		NodeId(pubkey.serialize())
	}

	pub fn from_array(bytes: [u8; 33]) -> Self {
		NodeId(bytes)
	}

	pub fn as_array(&self) -> &[u8; 33] {
		&self.0
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Re-derives the secp256k1 key, failing if the bytes are not a valid
	/// curve point.
	pub fn as_pubkey(&self) -> Result<PublicKey, bitcoin::secp256k1::Error> {
		PublicKey::from_slice(&self.0)
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0.as_hex())
	}
}

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "NodeId({})", self.0.as_hex())
	}
}

impl FromStr for NodeId {
	type Err = HexToArrayError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(NodeId(<[u8; 33]>::from_hex(s)?))
	}
}

/// Compact reference to the funding output of a channel: 3 bytes block
/// height, 3 bytes transaction index, 2 bytes output index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortChannelId(u64);

impl ShortChannelId {
	pub fn new(scid: u64) -> Self {
		ShortChannelId(scid)
	}

	pub fn from_parts(block_height: u32, tx_index: u32, output_index: u16) -> Self {
		ShortChannelId(
			((block_height as u64 & 0xffffff) << 40)
				| ((tx_index as u64 & 0xffffff) << 16)
				| output_index as u64,
		)
	}

	pub fn block_height(&self) -> u32 {
		(self.0 >> 40) as u32
	}

	pub fn tx_index(&self) -> u32 {
		((self.0 >> 16) & 0xffffff) as u32
	}

	pub fn output_index(&self) -> u16 {
		(self.0 & 0xffff) as u16
	}

	pub fn as_u64(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for ShortChannelId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}x{}x{}", self.block_height(), self.tx_index(), self.output_index())
	}
}

impl fmt::Debug for ShortChannelId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "ShortChannelId({})", self)
	}
}
