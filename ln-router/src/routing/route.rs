// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! One hop of a computed route, and the sanity limits a route must respect
//! before we try to pay over it.

use crate::graph::channel_info::Policy;
use crate::types::{NodeId, ShortChannelId};

/// The onion packet fits at most this many hops.
pub const MAX_EDGES_IN_PAYMENT_PATH: usize = 20;

/// No single hop may delay us by more than two weeks of blocks.
const MAX_EDGE_CLTV_EXPIRY_DELTA: u16 = 14 * 144;

/// A whole route may not lock funds up for more than two months of blocks.
const MAX_ROUTE_CLTV: u32 = 60 * 144;

/// Fees below 50 sat are accepted without further questions.
const FEE_SCRUTINY_THRESHOLD_MSAT: u64 = 50_000;

/// Hard fee ceiling of 5000 sat.
const MAX_FEE_MSAT: u64 = 5_000_000;

/// Above this amount, fees over 10% are rejected.
const TINY_AMOUNT_MSAT: u64 = 1_000_000;

/// One hop of a route: "by traversing `short_channel_id` you arrive at
/// `node_id`".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEdge {
	pub node_id: NodeId,
	pub short_channel_id: ShortChannelId,
	pub fee_base_msat: u32,
	pub fee_proportional_millionths: u32,
	pub cltv_expiry_delta: u16,
}

impl RouteEdge {
	pub fn from_policy(policy: &Policy, short_channel_id: ShortChannelId, end_node: NodeId) -> Self {
		RouteEdge {
			node_id: end_node,
			short_channel_id,
			fee_base_msat: policy.fee_base_msat,
			fee_proportional_millionths: policy.fee_proportional_millionths,
			cltv_expiry_delta: policy.cltv_expiry_delta,
		}
	}

	pub fn fee_for_amount(&self, amount_msat: u64) -> u64 {
		let proportional =
			amount_msat as u128 * self.fee_proportional_millionths as u128 / 1_000_000;
		self.fee_base_msat as u64 + proportional as u64
	}

	/// Whether this single hop is economically and temporally acceptable for
	/// forwarding `amount_msat`.
	pub fn is_sane_to_use(&self, amount_msat: u64) -> bool {
		if self.cltv_expiry_delta > MAX_EDGE_CLTV_EXPIRY_DELTA {
			return false;
		}
		let total_fee = self.fee_for_amount(amount_msat);
		if total_fee > FEE_SCRUTINY_THRESHOLD_MSAT {
			if total_fee > amount_msat {
				return false;
			}
			if total_fee > MAX_FEE_MSAT {
				return false;
			}
			if amount_msat > TINY_AMOUNT_MSAT && total_fee > amount_msat / 10 {
				return false;
			}
		}
		true
	}
}

/// Sanity-checks a whole route before paying over it.
///
/// Walks the route from the payee end, accumulating the forwarded amount and
/// the time-lock. The first edge is excluded from the fee walk: its fee is
/// the sender's own and not actually paid.
pub fn is_route_sane_to_use(
	route: &[RouteEdge], invoice_amount_msat: u64, min_final_cltv_expiry: u32,
) -> bool {
	if route.len() > MAX_EDGES_IN_PAYMENT_PATH {
		return false;
	}
	let mut amount = invoice_amount_msat;
	let mut cltv = min_final_cltv_expiry;
	for edge in route.iter().skip(1).rev() {
		if !edge.is_sane_to_use(amount) {
			return false;
		}
		amount += edge.fee_for_amount(amount);
		cltv += edge.cltv_expiry_delta as u32;
	}
	if cltv > MAX_ROUTE_CLTV {
		return false;
	}
	let total_fee = amount - invoice_amount_msat;
	if total_fee > FEE_SCRUTINY_THRESHOLD_MSAT {
		if total_fee > invoice_amount_msat {
			return false;
		}
		if total_fee > MAX_FEE_MSAT {
			return false;
		}
		if invoice_amount_msat > TINY_AMOUNT_MSAT && total_fee > invoice_amount_msat / 10 {
			return false;
		}
	}
	true
}
