// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Event notifications for the embedding wallet.

use crate::types::ShortChannelId;

/// Verification states a channel moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
	/// Announcement accepted, funding output not yet confirmed on-chain.
	Pending,
	/// Funding output confirmed and matching; visible to the path finder.
	Verified,
	/// Funding output missing or not the expected script; discarded.
	Rejected,
}

/// Events emitted by the routing core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	/// Fired whenever a channel's verification state changes.
	LnStatus { short_channel_id: ShortChannelId, state: ChannelState },
}

/// Receives [`Event`]s. Implemented by the wallet's notification bus.
pub trait EventPublisher: Send + Sync {
	fn publish(&self, event: Event);
}
