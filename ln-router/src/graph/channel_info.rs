// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Value types stored in the channel graph.

use crate::error::RouterError;
use crate::gossip::features::validate_features;
use crate::gossip::{ChannelAnnouncement, ChannelUpdate, NodeAnnouncement};
use crate::types::{NodeId, ShortChannelId};

/// Bit 0 of `channel_flags`: which endpoint the policy belongs to. Clear
/// means the byte-wise smaller node id, set means the larger.
pub const CHANNEL_FLAG_DIRECTION: u8 = 1 << 0;

/// Bit 1 of `channel_flags`: the channel is disabled in this direction.
pub const CHANNEL_FLAG_DISABLED: u8 = 1 << 1;

/// A node of the channel graph.
///
/// Nodes come into existence as soon as any channel references them; a shell
/// record carries no announcement data until a `node_announcement` upgrades
/// it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
	pub node_id: NodeId,
	pub features: u64,
	/// Unix seconds of the latest valid announcement, 0 for shell records.
	pub timestamp: u32,
	pub alias: String,
}

impl NodeInfo {
	pub(crate) fn shell(node_id: NodeId) -> Self {
		NodeInfo { node_id, features: 0, timestamp: 0, alias: String::new() }
	}

	pub fn from_announcement(msg: &NodeAnnouncement) -> Result<Self, RouterError> {
		validate_features(msg.features)?;
		let alias_end = msg.alias.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
		let alias = String::from_utf8_lossy(&msg.alias[..alias_end]).into_owned();
		Ok(NodeInfo { node_id: msg.node_id, features: msg.features, timestamp: msg.timestamp, alias })
	}
}

/// A network address of a node, together with when we last connected over it.
///
/// `last_connected_at` is 0 for addresses learned from announcements we never
/// dialled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerAddress {
	pub node_id: NodeId,
	pub host: String,
	pub port: u16,
	pub last_connected_at: u64,
}

/// A verified (or pending) channel between two nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
	pub short_channel_id: ShortChannelId,
	pub node1_id: NodeId,
	pub node2_id: NodeId,
	/// Funding output value; unknown until chain verification completes.
	pub capacity_sat: Option<u64>,
	/// The raw announcement, kept verbatim.
	pub announcement: Vec<u8>,
}

impl ChannelInfo {
	pub fn from_announcement(msg: &ChannelAnnouncement) -> Result<Self, RouterError> {
		validate_features(msg.features)?;
		if msg.node_id_1 >= msg.node_id_2 {
			return Err(RouterError::UnorderedNodeIds);
		}
		Ok(ChannelInfo {
			short_channel_id: msg.short_channel_id,
			node1_id: msg.node_id_1,
			node2_id: msg.node_id_2,
			capacity_sat: None,
			announcement: msg.raw.clone(),
		})
	}

	/// The endpoint on the far side of `node`, if `node` is an endpoint at
	/// all.
	pub fn other_node(&self, node: &NodeId) -> Option<NodeId> {
		if *node == self.node1_id {
			Some(self.node2_id)
		} else if *node == self.node2_id {
			Some(self.node1_id)
		} else {
			None
		}
	}
}

/// One direction of a channel's forwarding parameters, as last announced by
/// `start_node`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
	pub short_channel_id: ShortChannelId,
	pub start_node: NodeId,
	pub cltv_expiry_delta: u16,
	pub htlc_minimum_msat: u64,
	pub htlc_maximum_msat: Option<u64>,
	pub fee_base_msat: u32,
	pub fee_proportional_millionths: u32,
	pub channel_flags: u8,
	pub timestamp: u32,
}

impl Policy {
	pub fn from_update(msg: &ChannelUpdate, start_node: NodeId) -> Self {
		Policy {
			short_channel_id: msg.short_channel_id,
			start_node,
			cltv_expiry_delta: msg.cltv_expiry_delta,
			htlc_minimum_msat: msg.htlc_minimum_msat,
			htlc_maximum_msat: msg.htlc_maximum_msat,
			fee_base_msat: msg.fee_base_msat,
			fee_proportional_millionths: msg.fee_proportional_millionths,
			channel_flags: msg.channel_flags,
			timestamp: msg.timestamp,
		}
	}

	/// The fee charged for forwarding `amount_msat` through this direction.
	pub fn fee_for_amount(&self, amount_msat: u64) -> u64 {
		let proportional =
			amount_msat as u128 * self.fee_proportional_millionths as u128 / 1_000_000;
		self.fee_base_msat as u64 + proportional as u64
	}

	pub fn is_disabled(&self) -> bool {
		self.channel_flags & CHANNEL_FLAG_DISABLED != 0
	}

	/// 0 when the policy belongs to the smaller node id, 1 for the larger.
	pub fn direction(&self) -> u8 {
		self.channel_flags & CHANNEL_FLAG_DIRECTION
	}
}
