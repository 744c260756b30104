// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Chain verification of announced channels.
//!
//! Announcements are cheap to forge until their funding output is seen
//! on-chain. Staged channels wait here until the chain source confirms an
//! output whose script matches the announced endpoints, at which point they
//! are promoted into the verified graph with their real capacity.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::chain::{expected_funding_script, ChainSource, ChainSourceError};
use crate::error::RouterError;
use crate::graph::channel_info::ChannelInfo;
use crate::graph::GraphStore;
use crate::types::ShortChannelId;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// Lookups that keep failing stop polling after this many attempts; the
/// channel stays pending and is picked up again if resubmitted.
const MAX_LOOKUP_ATTEMPTS: u32 = 8;

/// Verifies pending channels against the chain.
///
/// Wire it to a [`GraphStore`] via [`ChannelVerifier::new`] and drive it by
/// spawning [`ChannelVerifier::run`] on the wallet's runtime. Removing a
/// channel from the store cancels its in-flight verification.
pub struct ChannelVerifier {
	store: Arc<GraphStore>,
	chain: Arc<dyn ChainSource>,
	queue: Mutex<Option<UnboundedReceiver<ShortChannelId>>>,
}

impl ChannelVerifier {
	pub fn new(store: Arc<GraphStore>, chain: Arc<dyn ChainSource>) -> Arc<Self> {
		let (sender, receiver) = mpsc::unbounded_channel();
		store.set_verification_queue(sender);
		Arc::new(ChannelVerifier { store, chain, queue: Mutex::new(Some(receiver)) })
	}

	/// Stages a channel for verification outside the gossip path (e.g. one
	/// recovered from a backup).
	pub fn submit(&self, channel: ChannelInfo) -> Result<(), RouterError> {
		self.store.stage_pending(channel)
	}

	/// The staged channel for `scid`, if its verification is still in flight.
	pub fn lookup_pending(&self, scid: ShortChannelId) -> Option<ChannelInfo> {
		self.store.lookup_pending(scid)
	}

	/// Processes verification requests until the store is dropped. Each
	/// channel is verified on its own task so one slow lookup does not stall
	/// the rest.
	pub async fn run(self: Arc<Self>) {
		let receiver = self.queue.lock().unwrap().take();
		let Some(mut receiver) = receiver else {
			debug!("Channel verifier started twice; ignoring");
			return;
		};
		while let Some(scid) = receiver.recv().await {
			let verifier = Arc::clone(&self);
			tokio::spawn(async move {
				verifier.verify_channel(scid).await;
			});
		}
	}

	async fn verify_channel(&self, scid: ShortChannelId) {
		let mut delay = RETRY_BASE_DELAY;
		for attempt in 1..=MAX_LOOKUP_ATTEMPTS {
			// The pending entry disappears when the channel is removed,
			// which cancels the verification.
			let Some(pending) = self.store.lookup_pending(scid) else {
				return;
			};
			match self.chain.funding_output(scid).await {
				Ok(output) => {
					let expected =
						expected_funding_script(&pending.node1_id, &pending.node2_id);
					match expected {
						Ok(script) if script == output.script_pubkey => {
							debug!(
								"Funding output of {} checks out with {} sat",
								scid, output.value_sat
							);
							match self.store.promote_pending(scid, output.value_sat) {
								Ok(_) => {},
								Err(e) => warn!("Failed to promote channel {}: {}", scid, e),
							}
						},
						Ok(_) => {
							warn!(
								"Funding output of {} is not the announced 2-of-2; discarding",
								scid
							);
							self.store.discard_pending(scid);
						},
						Err(_) => {
							warn!("Announced endpoints of {} are not valid keys; discarding", scid);
							self.store.discard_pending(scid);
						},
					}
					return;
				},
				Err(ChainSourceError::NotFound) => {
					debug!(
						"Funding output of {} not found on-chain yet (attempt {})",
						scid, attempt
					);
				},
				Err(ChainSourceError::Transient(msg)) => {
					debug!("Chain lookup for {} failed: {} (attempt {})", scid, msg, attempt);
				},
			}
			tokio::time::sleep(delay).await;
			delay = (delay * 2).min(RETRY_MAX_DELAY);
		}
		debug!("Giving up chain lookups for {}; channel stays pending", scid);
	}
}
