// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fmt;

/// Errors surfaced by the routing core.
///
/// Most gossip-validation failures are expected noise: the ingest loop logs
/// them at debug level and drops the message. Only
/// [`RouterError::NotFoundChanAnnouncementForUpdate`] (the caller may want to
/// request the missing announcement) and [`RouterError::Persistence`] carry
/// actionable information.
#[derive(Debug)]
pub enum RouterError {
	/// A feature bitfield carried an even (compulsory) bit this wallet does
	/// not understand.
	UnknownEvenFeatureBits,

	/// A `channel_update` referenced a short channel id with no matching
	/// announcement, neither pending nor verified.
	NotFoundChanAnnouncementForUpdate,

	/// The message was produced for a different chain than ours.
	WrongChainHash,

	/// ECDSA signature verification failed, or the signed payload was
	/// malformed.
	InvalidSignature,

	/// A channel announcement for an already-known short channel id.
	DuplicateChannel,

	/// The message's timestamp is not newer than the stored record's; the
	/// message is obsolete and the record is kept.
	StaleTimestamp,

	/// A channel announcement whose endpoint ids are not in ascending order.
	UnorderedNodeIds,

	/// No directional policy is known for a hop of a computed path.
	MissingRoutingPolicy,

	/// The underlying database failed. The store stays consistent; the
	/// current operation is lost.
	Persistence(rusqlite::Error),
}

impl fmt::Display for RouterError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RouterError::UnknownEvenFeatureBits => {
				write!(f, "unknown even (compulsory) feature bits")
			},
			RouterError::NotFoundChanAnnouncementForUpdate => {
				write!(f, "no channel announcement known for this channel update")
			},
			RouterError::WrongChainHash => write!(f, "message is for a different chain"),
			RouterError::InvalidSignature => write!(f, "signature verification failed"),
			RouterError::DuplicateChannel => write!(f, "channel is already known"),
			RouterError::StaleTimestamp => {
				write!(f, "message is not newer than the stored record")
			},
			RouterError::UnorderedNodeIds => {
				write!(f, "channel endpoint ids are not in ascending order")
			},
			RouterError::MissingRoutingPolicy => {
				write!(f, "no routing policy known for a hop of the path")
			},
			RouterError::Persistence(e) => write!(f, "database failure: {}", e),
		}
	}
}

impl std::error::Error for RouterError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			RouterError::Persistence(e) => Some(e),
			_ => None,
		}
	}
}

impl From<rusqlite::Error> for RouterError {
	fn from(e: rusqlite::Error) -> Self {
		RouterError::Persistence(e)
	}
}
