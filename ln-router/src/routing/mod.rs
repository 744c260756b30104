// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Route computation over the channel graph.

mod pathfind;
mod route;

pub use pathfind::{LocalChannel, PathFinder, PathHop};
pub use route::{is_route_sane_to_use, RouteEdge, MAX_EDGES_IN_PAYMENT_PATH};
