//! RPC service trait for search-group operations.
//!
//! The transport owns sockets, encoding, and deadlines. It hands each
//! decoded request to an implementation of this trait and sends back
//! whatever response comes out.

use cairn_core::{ReplicateRequest, ReplicateResponse, SubscribeRequest, SubscribeResponse};

/// Inbound side of the search-group protocol.
///
/// Implementations never fail at the Rust level; every outcome, including
/// rejected input, is a `Status` inside the response.
pub trait SearchGroupRpc: Send + Sync {
    fn subscribe(&self, req: &SubscribeRequest) -> SubscribeResponse;

    fn replicate(&self, req: &ReplicateRequest) -> ReplicateResponse;
}
