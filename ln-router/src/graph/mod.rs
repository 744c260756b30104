// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The channel graph: verified topology, per-direction policies, node
//! addresses, and the staging area for channels awaiting chain proof.
//!
//! All state is mirrored between a SQLite database (authoritative across
//! restarts) and an in-memory cache guarded by a single `RwLock`. Mutations
//! write the database first, while holding the cache write guard, so readers
//! never observe a half-applied change and a failed write leaves both copies
//! untouched. Private-channel policies and pending channels live in memory
//! only.

pub mod channel_info;
mod sqlite;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::blockdata::constants::genesis_block;
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::{BlockHash, Network};
use log::{debug, info};
use rand::seq::SliceRandom;
use rusqlite::Connection;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::RouterError;
use crate::events::{ChannelState, Event, EventPublisher};
use crate::gossip::address::parse_address_field;
use crate::gossip::{
	self, ChannelAnnouncement, ChannelUpdate, NodeAnnouncement,
	CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET, SINGLE_SIG_SIGNED_OFFSET,
};
use crate::types::{NodeId, ShortChannelId};

use channel_info::{ChannelInfo, NodeInfo, PeerAddress, Policy, CHANNEL_FLAG_DIRECTION};

/// The recent-peers set keeps at most this many dialled addresses; the
/// longest-unseen entry is evicted beyond it.
pub const NUM_MAX_RECENT_PEERS: usize = 20;

/// Upper bound on [`GraphStore::sample_random_nodes`] results.
pub const MAX_RANDOM_NODE_SAMPLE: usize = 200;

/// A channel whose announcement checked out but whose funding output has not
/// been confirmed on-chain yet. Invisible to the path finder.
struct PendingChannel {
	info: ChannelInfo,
	/// Updates received while pending; promoted together with the channel.
	policies: Vec<Policy>,
}

pub(crate) struct GraphCache {
	pub(crate) channels: HashMap<ShortChannelId, ChannelInfo>,
	pub(crate) policies: HashMap<(ShortChannelId, NodeId), Policy>,
	pub(crate) nodes: HashMap<NodeId, NodeInfo>,
	pub(crate) channels_by_node: HashMap<NodeId, Vec<ShortChannelId>>,
	addresses: Vec<PeerAddress>,
	pending: HashMap<ShortChannelId, PendingChannel>,
	/// (intentionally not persisted)
	private_updates: HashMap<(NodeId, ShortChannelId), Policy>,
}

/// The store of everything this wallet knows about the channel graph.
///
/// One instance per wallet, created once and passed explicitly to the
/// verifier and the path finder.
pub struct GraphStore {
	genesis_hash: BlockHash,
	secp: Secp256k1<VerifyOnly>,
	db: Mutex<Connection>,
	cache: RwLock<GraphCache>,
	publisher: Option<Arc<dyn EventPublisher>>,
	verification_queue: Mutex<Option<UnboundedSender<ShortChannelId>>>,
}

fn now_unix() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl GraphStore {
	/// Opens (or creates) the channel database at `path` and rebuilds the
	/// in-memory cache from it.
	pub fn open(
		path: &Path, network: Network, publisher: Option<Arc<dyn EventPublisher>>,
	) -> Result<Self, RouterError> {
		let conn = sqlite::open_database(path)?;

		let mut cache = GraphCache {
			channels: HashMap::new(),
			policies: HashMap::new(),
			nodes: HashMap::new(),
			channels_by_node: HashMap::new(),
			addresses: sqlite::load_addresses(&conn)?,
			pending: HashMap::new(),
			private_updates: HashMap::new(),
		};
		for node in sqlite::load_nodes(&conn)? {
			cache.nodes.insert(node.node_id, node);
		}
		for channel in sqlite::load_channels(&conn)? {
			for node in [channel.node1_id, channel.node2_id] {
				cache
					.channels_by_node
					.entry(node)
					.or_default()
					.push(channel.short_channel_id);
			}
			cache.channels.insert(channel.short_channel_id, channel);
		}
		for policy in sqlite::load_policies(&conn)? {
			cache.policies.insert((policy.short_channel_id, policy.start_node), policy);
		}

		info!(
			"Opened channel database with {} channels and {} nodes",
			cache.channels.len(),
			cache.nodes.len()
		);

		Ok(GraphStore {
			genesis_hash: genesis_block(network).block_hash(),
			secp: Secp256k1::verification_only(),
			db: Mutex::new(conn),
			cache: RwLock::new(cache),
			publisher,
			verification_queue: Mutex::new(None),
		})
	}

	fn emit(&self, short_channel_id: ShortChannelId, state: ChannelState) {
		if let Some(publisher) = &self.publisher {
			publisher.publish(Event::LnStatus { short_channel_id, state });
		}
	}

	pub(crate) fn set_verification_queue(&self, queue: UnboundedSender<ShortChannelId>) {
		*self.verification_queue.lock().unwrap() = Some(queue);
	}

	pub(crate) fn read_graph(&self) -> RwLockReadGuard<'_, GraphCache> {
		self.cache.read().unwrap()
	}

	/// Ingests a `channel_announcement`.
	///
	/// Trusted announcements (our own channels, or a source we already
	/// authenticated) skip the signature checks and go straight into the
	/// verified graph; everything else is staged for chain verification.
	pub fn on_channel_announcement(
		&self, msg: &ChannelAnnouncement, trusted: bool,
	) -> Result<(), RouterError> {
		if msg.chain_hash != self.genesis_hash {
			return Err(RouterError::WrongChainHash);
		}
		let info = ChannelInfo::from_announcement(msg)?;
		let scid = info.short_channel_id;

		let mut cache = self.cache.write().unwrap();
		if cache.channels.contains_key(&scid) || cache.pending.contains_key(&scid) {
			return Err(RouterError::DuplicateChannel);
		}
		if !trusted {
			gossip::verify_node_signature(
				&self.secp,
				&msg.raw,
				CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET,
				&msg.node_signature_1,
				&msg.node_id_1,
			)?;
			gossip::verify_node_signature(
				&self.secp,
				&msg.raw,
				CHANNEL_ANNOUNCEMENT_SIGNED_OFFSET,
				&msg.node_signature_2,
				&msg.node_id_2,
			)?;
		}

		if trusted {
			self.insert_verified(&mut cache, info, Vec::new())?;
			drop(cache);
			self.emit(scid, ChannelState::Verified);
		} else {
			self.stage_pending_locked(&mut cache, info);
			drop(cache);
			self.emit(scid, ChannelState::Pending);
		}
		Ok(())
	}

	/// Stages `info` for chain verification and pokes the verifier task.
	pub(crate) fn stage_pending(&self, info: ChannelInfo) -> Result<(), RouterError> {
		let scid = info.short_channel_id;
		{
			let mut cache = self.cache.write().unwrap();
			if cache.channels.contains_key(&scid) || cache.pending.contains_key(&scid) {
				return Err(RouterError::DuplicateChannel);
			}
			self.stage_pending_locked(&mut cache, info);
		}
		self.emit(scid, ChannelState::Pending);
		Ok(())
	}

	fn stage_pending_locked(&self, cache: &mut GraphCache, info: ChannelInfo) {
		let scid = info.short_channel_id;
		debug!("Staging channel {} for chain verification", scid);
		cache.pending.insert(scid, PendingChannel { info, policies: Vec::new() });
		// Unbounded send never blocks, so poking the verifier under the lock
		// is fine.
		if let Some(queue) = &*self.verification_queue.lock().unwrap() {
			let _ = queue.send(scid);
		}
	}

	fn insert_verified(
		&self, cache: &mut GraphCache, info: ChannelInfo, policies: Vec<Policy>,
	) -> Result<(), RouterError> {
		let scid = info.short_channel_id;
		{
			let mut conn = self.db.lock().unwrap();
			let tx = conn.transaction()?;
			sqlite::insert_channel(&tx, &info)?;
			for policy in &policies {
				sqlite::upsert_policy(&tx, policy)?;
			}
			tx.commit()?;
		}

		for node in [info.node1_id, info.node2_id] {
			cache.nodes.entry(node).or_insert_with(|| NodeInfo::shell(node));
			cache.channels_by_node.entry(node).or_default().push(scid);
		}
		for policy in policies {
			cache.policies.insert((scid, policy.start_node), policy);
		}
		cache.channels.insert(scid, info);

		info!("Channel {} entered the verified graph", scid);
		Ok(())
	}

	/// Ingests a `channel_update`, replacing the directional policy it
	/// carries if it is newer than what we have.
	pub fn on_channel_update(&self, msg: &ChannelUpdate, trusted: bool) -> Result<(), RouterError> {
		if msg.chain_hash != self.genesis_hash {
			return Err(RouterError::WrongChainHash);
		}
		let scid = msg.short_channel_id;

		let mut cache = self.cache.write().unwrap();
		let (node1, node2, is_pending) = if let Some(pending) = cache.pending.get(&scid) {
			(pending.info.node1_id, pending.info.node2_id, true)
		} else if let Some(channel) = cache.channels.get(&scid) {
			(channel.node1_id, channel.node2_id, false)
		} else {
			debug!("No channel announcement known for update of {}", scid);
			return Err(RouterError::NotFoundChanAnnouncementForUpdate);
		};

		let start_node =
			if msg.channel_flags & CHANNEL_FLAG_DIRECTION == 0 { node1 } else { node2 };

		let existing_timestamp = if is_pending {
			cache.pending[&scid]
				.policies
				.iter()
				.find(|p| p.start_node == start_node)
				.map(|p| p.timestamp)
		} else {
			cache.policies.get(&(scid, start_node)).map(|p| p.timestamp)
		};
		if let Some(timestamp) = existing_timestamp {
			if timestamp >= msg.timestamp {
				debug!("Ignoring channel update for {} not newer than the stored policy", scid);
				return Err(RouterError::StaleTimestamp);
			}
		}

		if !trusted {
			gossip::verify_node_signature(
				&self.secp,
				&msg.raw,
				SINGLE_SIG_SIGNED_OFFSET,
				&msg.signature,
				&start_node,
			)?;
		}

		let policy = Policy::from_update(msg, start_node);
		if is_pending {
			let pending = cache.pending.get_mut(&scid).expect("checked above");
			pending.policies.retain(|p| p.start_node != start_node);
			pending.policies.push(policy);
		} else {
			sqlite::upsert_policy(&self.db.lock().unwrap(), &policy)?;
			cache.policies.insert((scid, start_node), policy);
		}
		Ok(())
	}

	/// Ingests a `node_announcement`, replacing the node record and its
	/// address list if the announcement is newer.
	pub fn on_node_announcement(&self, msg: &NodeAnnouncement) -> Result<(), RouterError> {
		gossip::verify_node_signature(
			&self.secp,
			&msg.raw,
			SINGLE_SIG_SIGNED_OFFSET,
			&msg.signature,
			&msg.node_id,
		)?;
		let node = NodeInfo::from_announcement(msg)?;
		let announced: Vec<(String, u16)> =
			parse_address_field(&msg.addresses).iter().map(|a| (a.host(), a.port())).collect();

		let mut cache = self.cache.write().unwrap();
		if let Some(existing) = cache.nodes.get(&msg.node_id) {
			if existing.timestamp >= node.timestamp {
				debug!("Ignoring node announcement for {} not newer than stored", msg.node_id);
				return Err(RouterError::StaleTimestamp);
			}
		}

		{
			let mut conn = self.db.lock().unwrap();
			let tx = conn.transaction()?;
			sqlite::replace_node(&tx, &node, &announced)?;
			tx.commit()?;
		}

		cache.addresses.retain(|a| a.node_id != msg.node_id);
		for (host, port) in announced {
			cache.addresses.push(PeerAddress {
				node_id: msg.node_id,
				host,
				port,
				last_connected_at: 0,
			});
		}
		cache.nodes.insert(msg.node_id, node);
		Ok(())
	}

	/// Remembers a policy for a channel we participate in but which is not
	/// publicly announced. Memory only; gone on restart.
	pub fn add_channel_update_for_private_channel(
		&self, msg: &ChannelUpdate, start_node: NodeId,
	) -> Result<(), RouterError> {
		gossip::verify_node_signature(
			&self.secp,
			&msg.raw,
			SINGLE_SIG_SIGNED_OFFSET,
			&msg.signature,
			&start_node,
		)?;
		let policy = Policy::from_update(msg, start_node);
		self.cache
			.write()
			.unwrap()
			.private_updates
			.insert((start_node, msg.short_channel_id), policy);
		Ok(())
	}

	/// Deletes a channel and everything hanging off it. Cancels a pending
	/// verification if one is in flight.
	pub fn remove_channel(&self, scid: ShortChannelId) -> Result<(), RouterError> {
		let mut cache = self.cache.write().unwrap();
		if cache.pending.remove(&scid).is_some() {
			debug!("Cancelled pending verification of {}", scid);
		}
		if cache.channels.contains_key(&scid) {
			sqlite::delete_channel(&self.db.lock().unwrap(), scid)?;
			let info = cache.channels.remove(&scid).expect("checked above");
			cache.policies.retain(|&(s, _), _| s != scid);
			for node in [info.node1_id, info.node2_id] {
				if let Some(list) = cache.channels_by_node.get_mut(&node) {
					list.retain(|s| *s != scid);
				}
			}
			info!("Removed channel {}", scid);
		}
		Ok(())
	}

	pub fn get_channel_info(&self, scid: ShortChannelId) -> Option<ChannelInfo> {
		self.cache.read().unwrap().channels.get(&scid).cloned()
	}

	/// The policy for forwarding out of `start_node` over `scid`, preferring
	/// the verified graph and falling back to private-channel updates.
	pub fn get_routing_policy(
		&self, start_node: NodeId, scid: ShortChannelId,
	) -> Option<Policy> {
		let cache = self.cache.read().unwrap();
		cache
			.policies
			.get(&(scid, start_node))
			.or_else(|| cache.private_updates.get(&(start_node, scid)))
			.cloned()
	}

	/// All verified channels incident to `node_id`, both endpoints.
	pub fn get_channels_for_node(&self, node_id: NodeId) -> Vec<ShortChannelId> {
		self.cache
			.read()
			.unwrap()
			.channels_by_node
			.get(&node_id)
			.cloned()
			.unwrap_or_default()
	}

	pub fn get_node_info(&self, node_id: NodeId) -> Option<NodeInfo> {
		self.cache.read().unwrap().nodes.get(&node_id).cloned()
	}

	pub fn num_nodes(&self) -> usize {
		self.cache.read().unwrap().nodes.len()
	}

	pub fn num_channels(&self) -> usize {
		self.cache.read().unwrap().channels.len()
	}

	/// Records that we connected to `node_id` at `host:port` just now,
	/// evicting the longest-unseen entry beyond the recent-peers cap.
	pub fn add_recent_peer(
		&self, node_id: NodeId, host: String, port: u16,
	) -> Result<(), RouterError> {
		let peer = PeerAddress { node_id, host, port, last_connected_at: now_unix() };

		let mut cache = self.cache.write().unwrap();
		sqlite::upsert_address(&self.db.lock().unwrap(), &peer)?;
		cache.nodes.entry(node_id).or_insert_with(|| NodeInfo::shell(node_id));
		if let Some(existing) = cache
			.addresses
			.iter_mut()
			.find(|a| a.node_id == peer.node_id && a.host == peer.host && a.port == peer.port)
		{
			existing.last_connected_at = peer.last_connected_at;
		} else {
			cache.addresses.push(peer);
		}

		while cache.addresses.iter().filter(|a| a.last_connected_at > 0).count()
			> NUM_MAX_RECENT_PEERS
		{
			let oldest = cache
				.addresses
				.iter()
				.filter(|a| a.last_connected_at > 0)
				.min_by_key(|a| a.last_connected_at)
				.cloned()
				.expect("count checked above");
			sqlite::delete_address(
				&self.db.lock().unwrap(),
				&oldest.node_id,
				&oldest.host,
				oldest.port,
			)?;
			cache.addresses.retain(|a| {
				!(a.node_id == oldest.node_id && a.host == oldest.host && a.port == oldest.port)
			});
		}
		Ok(())
	}

	/// Up to `limit` addresses we recently connected over, newest first.
	pub fn get_recent_peers(&self, limit: usize) -> Vec<PeerAddress> {
		let cache = self.cache.read().unwrap();
		let mut peers: Vec<PeerAddress> =
			cache.addresses.iter().filter(|a| a.last_connected_at > 0).cloned().collect();
		peers.sort_by(|a, b| b.last_connected_at.cmp(&a.last_connected_at));
		peers.truncate(limit);
		peers
	}

	/// The address of `node_id` we most recently connected over, if any is
	/// known at all.
	pub fn get_last_good_address(&self, node_id: NodeId) -> Option<PeerAddress> {
		let cache = self.cache.read().unwrap();
		cache
			.addresses
			.iter()
			.filter(|a| a.node_id == node_id)
			.max_by_key(|a| a.last_connected_at)
			.cloned()
	}

	/// Up to `k` (capped at [`MAX_RANDOM_NODE_SAMPLE`]) node records outside
	/// `exclude`, in uniformly random order.
	pub fn sample_random_nodes(&self, exclude: &HashSet<NodeId>, k: usize) -> Vec<NodeInfo> {
		let cache = self.cache.read().unwrap();
		let mut nodes: Vec<NodeInfo> = cache
			.nodes
			.values()
			.filter(|node| !exclude.contains(&node.node_id))
			.cloned()
			.collect();
		nodes.shuffle(&mut rand::thread_rng());
		nodes.truncate(k.min(MAX_RANDOM_NODE_SAMPLE));
		nodes
	}

	pub(crate) fn lookup_pending(&self, scid: ShortChannelId) -> Option<ChannelInfo> {
		self.cache.read().unwrap().pending.get(&scid).map(|p| p.info.clone())
	}

	/// Moves a pending channel into the verified graph with its on-chain
	/// capacity. Returns `false` when the pending entry vanished in the
	/// meantime (removed, hence cancelled).
	pub(crate) fn promote_pending(
		&self, scid: ShortChannelId, capacity_sat: u64,
	) -> Result<bool, RouterError> {
		{
			let mut cache = self.cache.write().unwrap();
			let Some(mut pending) = cache.pending.remove(&scid) else {
				return Ok(false);
			};
			pending.info.capacity_sat = Some(capacity_sat);
			self.insert_verified(&mut cache, pending.info, pending.policies)?;
		}
		self.emit(scid, ChannelState::Verified);
		Ok(true)
	}

	/// Drops a pending channel whose funding output turned out wrong.
	pub(crate) fn discard_pending(&self, scid: ShortChannelId) {
		let removed = self.cache.write().unwrap().pending.remove(&scid).is_some();
		if removed {
			self.emit(scid, ChannelState::Rejected);
		}
	}
}
