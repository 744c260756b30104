// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Lightning routing core for a lightweight Bitcoin wallet.
//!
//! Ingests gossip announcing payment-channel topology, maintains a verified
//! channel graph backed by SQLite, and computes fee- and delay-minimising
//! payment paths over it. Gossip transport, wire deserialisation and chain
//! watching live outside this crate; see [`gossip`] for the payload boundary
//! and [`chain::ChainSource`] for the chain seam.

pub mod chain;
mod error;
pub mod events;
pub mod gossip;
pub mod graph;
pub mod routing;
mod types;
pub mod util;
mod verifier;

pub use error::RouterError;
pub use graph::channel_info::{ChannelInfo, NodeInfo, PeerAddress, Policy};
pub use graph::GraphStore;
pub use routing::{is_route_sane_to_use, LocalChannel, PathFinder, RouteEdge};
pub use types::{NodeId, ShortChannelId};
pub use verifier::ChannelVerifier;
