//! Search-group RPC messages.
//!
//! Two synchronous request/response operations: `subscribe` and `replicate`.
//! Every response carries a `Status`; transport failures are reported by the
//! transport, not here. Messages travel as JSON.

use serde::{Deserialize, Serialize};

use crate::addr::NetworkAddress;
use crate::error::Status;
use crate::key::OverlayKey;

/// A subscriber as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    pub key: OverlayKey,
    pub address: String,
    pub port: u16,
}

impl PeerRecord {
    pub fn net_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.address.clone(), self.port)
    }
}

/// Join (or query) a search group.
///
/// A `sender_addr` left unspecified asks for peers without joining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub recipient_key: OverlayKey,
    #[serde(default)]
    pub recipient_addr: NetworkAddress,
    pub sender_key: OverlayKey,
    #[serde(default)]
    pub sender_addr: NetworkAddress,
    pub group_key: OverlayKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub peers: Vec<PeerRecord>,
    pub status: Status,
}

impl SubscribeResponse {
    pub fn failed(status: Status) -> Self {
        Self {
            peers: Vec::new(),
            status,
        }
    }
}

/// One group's state as pushed between replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_key: OverlayKey,
    #[serde(default)]
    pub subscribers: Vec<PeerRecord>,
    #[serde(default)]
    pub replication_radius: u32,
    /// Unix ms. Zero when the sender does not track it.
    #[serde(default)]
    pub last_time_of_use: u64,
}

/// Push of an owner's group state to a replica holder.
///
/// `is_diff` marks a delta since an earlier round; otherwise the groups are
/// full snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub recipient_key: OverlayKey,
    #[serde(default)]
    pub recipient_addr: NetworkAddress,
    pub sender_key: OverlayKey,
    #[serde(default)]
    pub sender_addr: NetworkAddress,
    pub owner_key: OverlayKey,
    #[serde(default)]
    pub groups: Vec<GroupSnapshot>,
    #[serde(default)]
    pub is_diff: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicateResponse {
    pub status: Status,
}
