// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Payment path search.
//!
//! Dijkstra run backwards from the payee: the fee a hop charges depends on
//! the amount it forwards, which is the downstream amount plus downstream
//! fees, so amounts are only known when walking from the destination. The
//! whole search runs under one read guard of the graph, so it sees a
//! consistent snapshot.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::error::RouterError;
use crate::graph::{GraphCache, GraphStore};
use crate::routing::route::RouteEdge;
use crate::types::{NodeId, ShortChannelId};

/// Cost units per block of cltv delay. Fees count one unit per msat, which
/// calibrates ten satoshi of fee to one block of added delay.
const COST_PER_CLTV_BLOCK: u64 = 10_000;

/// The search's view of one of our own channels: whether it currently has
/// the liquidity to carry an outgoing payment.
pub trait LocalChannel {
	fn can_pay(&self, amount_msat: u64) -> bool;
}

/// An entry of the returned path: "to reach `node_id`, traverse
/// `short_channel_id`".
pub type PathHop = (NodeId, ShortChannelId);

/// Computes payment paths over a [`GraphStore`].
pub struct PathFinder {
	graph: Arc<GraphStore>,
}

impl PathFinder {
	pub fn new(graph: Arc<GraphStore>) -> Self {
		PathFinder { graph }
	}

	/// Returns a path from `node_a` (payer) to `node_b` (payee) able to carry
	/// `invoice_amount_msat`, or `None` when no usable path exists or the
	/// deadline expires first.
	///
	/// `my_channels` lets the search check liquidity on channels we would
	/// originate the payment through; for those the fee and cltv are ours and
	/// do not count towards the path cost. Channels in `blacklist` are never
	/// used; the set is the caller's failed-payment feedback and is only read
	/// here.
	pub fn find_path_for_payment(
		&self, node_a: NodeId, node_b: NodeId, invoice_amount_msat: u64,
		my_channels: &HashMap<ShortChannelId, &dyn LocalChannel>,
		blacklist: &HashSet<ShortChannelId>, deadline: Option<Instant>,
	) -> Option<Vec<PathHop>> {
		if node_a == node_b {
			debug!("Refusing to compute a route to ourselves");
			return None;
		}

		let cache = self.graph.read_graph();

		// No decrease-key: relaxations push duplicates and stale entries are
		// filtered on pop. Ties break on forwarded amount, then node id, so
		// the search is deterministic.
		let mut queue: BinaryHeap<Reverse<(u64, u64, NodeId)>> = BinaryHeap::new();
		let mut distance: HashMap<NodeId, u64> = HashMap::new();
		let mut predecessor: HashMap<NodeId, PathHop> = HashMap::new();

		distance.insert(node_b, 0);
		queue.push(Reverse((0, invoice_amount_msat, node_b)));

		let mut found = false;
		while let Some(Reverse((dist, amount_msat, end_node))) = queue.pop() {
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					debug!("Path search deadline expired");
					return None;
				}
			}
			if end_node == node_a {
				found = true;
				break;
			}
			if distance.get(&end_node) != Some(&dist) {
				continue; // stale duplicate of an already-relaxed entry
			}
			let Some(channel_ids) = cache.channels_by_node.get(&end_node) else {
				continue;
			};
			for &scid in channel_ids {
				if blacklist.contains(&scid) {
					continue;
				}
				let Some(channel) = cache.channels.get(&scid) else { continue };
				let Some(start_node) = channel.other_node(&end_node) else { continue };

				let our_outgoing_channel =
					start_node == node_a && my_channels.contains_key(&scid);
				if our_outgoing_channel && !my_channels[&scid].can_pay(amount_msat) {
					continue; // not enough spendable balance on our side
				}

				let Some((edge_cost, fee_msat)) = evaluate_edge(
					&cache,
					scid,
					start_node,
					end_node,
					amount_msat,
					our_outgoing_channel,
				) else {
					continue;
				};

				let candidate = dist + edge_cost;
				if candidate < *distance.get(&start_node).unwrap_or(&u64::MAX) {
					distance.insert(start_node, candidate);
					predecessor.insert(start_node, (end_node, scid));
					queue.push(Reverse((candidate, amount_msat + fee_msat, start_node)));
				}
			}
		}
		if !found {
			return None;
		}

		// Walk the predecessor chain from the payer back towards the payee;
		// this already yields hops in forward payment order.
		let mut path = Vec::new();
		let mut cursor = node_a;
		while cursor != node_b {
			let (next_node, scid) = predecessor[&cursor];
			path.push((next_node, scid));
			cursor = next_node;
		}
		Some(path)
	}

	/// Materialises a path into route edges by resolving each hop's policy in
	/// the forward direction, consulting private-channel updates where the
	/// public graph has none.
	pub fn create_route_from_path(
		&self, path: &[PathHop], from_node: NodeId,
	) -> Result<Vec<RouteEdge>, RouterError> {
		let mut route = Vec::with_capacity(path.len());
		let mut previous = from_node;
		for &(node_id, scid) in path {
			let policy = self
				.graph
				.get_routing_policy(previous, scid)
				.ok_or(RouterError::MissingRoutingPolicy)?;
			route.push(RouteEdge::from_policy(&policy, scid, node_id));
			previous = node_id;
		}
		Ok(route)
	}
}

/// Heuristic cost of forwarding `amount_msat` from `start_node` to `end_node`
/// over `scid`, and the fee that hop would charge. `None` marks an unusable
/// edge.
fn evaluate_edge(
	cache: &GraphCache, scid: ShortChannelId, start_node: NodeId, end_node: NodeId,
	amount_msat: u64, ignore_costs: bool,
) -> Option<(u64, u64)> {
	let channel = cache.channels.get(&scid)?;
	let policy = cache.policies.get(&(scid, start_node))?;
	if policy.is_disabled() {
		return None;
	}
	if amount_msat < policy.htlc_minimum_msat {
		return None;
	}
	if let Some(capacity_sat) = channel.capacity_sat {
		if amount_msat / 1000 > capacity_sat {
			return None;
		}
	}
	if let Some(htlc_maximum_msat) = policy.htlc_maximum_msat {
		if amount_msat > htlc_maximum_msat {
			return None;
		}
	}
	if !RouteEdge::from_policy(policy, scid, end_node).is_sane_to_use(amount_msat) {
		return None;
	}
	let (fee_msat, cltv_delta) = if ignore_costs {
		(0, 0)
	} else {
		(policy.fee_for_amount(amount_msat), policy.cltv_expiry_delta as u64)
	};
	// One extra block per hop biases ties towards shorter paths.
	let cost = cltv_delta * COST_PER_CLTV_BLOCK + fee_msat + COST_PER_CLTV_BLOCK;
	Some((cost, fee_msat))
}
