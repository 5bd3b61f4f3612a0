//! cairn-services — search-group state and the node that serves it.

pub mod manager;
pub mod node;
pub mod routing;
pub mod searchgroup;
pub mod service;
pub mod store;
pub mod subscriber;
pub mod sweeper;

use std::time::{SystemTime, UNIX_EPOCH};

pub use manager::SearchGroupManager;
pub use node::{NodeHandle, OverlayNode};
pub use routing::{RoutingNode, StaticRouting, VnodeEvent};
pub use searchgroup::{MergeOutcome, Searchgroup};
pub use service::SearchGroupRpc;
pub use store::GroupStore;
pub use subscriber::Subscriber;
pub use sweeper::{SweepStats, Sweeper};

/// Wall-clock time as unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
