//! Routing-layer seam.
//!
//! The search-group node never looks inside the DHT ring. It needs this
//! node's keys, its advertised address, and to hear when virtual nodes are
//! regenerated, since group placement depends on them.

use std::sync::{Mutex, PoisonError};

use cairn_core::key::KEY_BYTES;
use cairn_core::{NetworkAddress, OverlayKey};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VnodeEvent {
    /// Virtual nodes were (re)generated; `generation` increases each time.
    Regenerated { generation: u64 },
}

pub trait RoutingNode: Send + Sync {
    /// Node identity followed by its virtual node keys.
    fn node_keys(&self) -> Vec<OverlayKey>;

    /// Address peers should use to reach this node.
    fn net_address(&self) -> NetworkAddress;

    /// Whether virtual node state survived from a previous run. When it did
    /// not, any persisted group data is stale.
    fn has_persistent_data(&self) -> bool;

    fn subscribe_vnode_events(&self) -> broadcast::Receiver<VnodeEvent>;
}

/// A fixed node key with virtual node keys derived from it.
///
/// Vnode key `i` of generation `g` is BLAKE3(node_key || g || i), truncated.
pub struct StaticRouting {
    node_key: OverlayKey,
    address: NetworkAddress,
    vnode_count: u32,
    persistent: bool,
    state: Mutex<VnodeState>,
    events: broadcast::Sender<VnodeEvent>,
}

struct VnodeState {
    generation: u64,
    vnodes: Vec<OverlayKey>,
}

impl StaticRouting {
    pub fn new(node_key: OverlayKey, address: NetworkAddress, vnode_count: u32) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            node_key,
            address,
            vnode_count,
            persistent: false,
            state: Mutex::new(VnodeState {
                generation: 0,
                vnodes: derive_vnodes(&node_key, 0, vnode_count),
            }),
            events,
        }
    }

    /// Mark vnode state as carried over from a previous run.
    pub fn with_persistent_data(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn node_key(&self) -> OverlayKey {
        self.node_key
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Derive a fresh set of vnode keys and notify subscribers.
    pub fn regenerate(&self) -> u64 {
        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.generation += 1;
            state.vnodes = derive_vnodes(&self.node_key, state.generation, self.vnode_count);
            state.generation
        };
        tracing::info!(generation, vnodes = self.vnode_count, "virtual nodes regenerated");
        // No receivers is fine: nothing depends on vnodes yet.
        let _ = self.events.send(VnodeEvent::Regenerated { generation });
        generation
    }
}

impl RoutingNode for StaticRouting {
    fn node_keys(&self) -> Vec<OverlayKey> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::iter::once(self.node_key)
            .chain(state.vnodes.iter().copied())
            .collect()
    }

    fn net_address(&self) -> NetworkAddress {
        self.address.clone()
    }

    fn has_persistent_data(&self) -> bool {
        self.persistent
    }

    fn subscribe_vnode_events(&self) -> broadcast::Receiver<VnodeEvent> {
        self.events.subscribe()
    }
}

fn derive_vnodes(node_key: &OverlayKey, generation: u64, count: u32) -> Vec<OverlayKey> {
    (0..count)
        .map(|i| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(node_key.as_bytes());
            hasher.update(&generation.to_le_bytes());
            hasher.update(&i.to_le_bytes());
            let hash = hasher.finalize();
            let mut bytes = [0u8; KEY_BYTES];
            bytes.copy_from_slice(&hash.as_bytes()[..KEY_BYTES]);
            OverlayKey::from_bytes(bytes)
        })
        .collect()
}
