//! cairn-core — shared identifiers, RPC wire types, errors, and configuration.
//! All other Cairn crates depend on this one.

pub mod addr;
pub mod config;
pub mod error;
pub mod key;
pub mod rpc;

pub use addr::NetworkAddress;
pub use error::{SgError, Status};
pub use key::OverlayKey;
pub use rpc::{
    GroupSnapshot, PeerRecord, ReplicateRequest, ReplicateResponse, SubscribeRequest,
    SubscribeResponse,
};
