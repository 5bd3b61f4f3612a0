//! A peer's membership record inside one search group.

use cairn_core::{NetworkAddress, OverlayKey, PeerRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub key: OverlayKey,
    pub address: String,
    pub port: u16,
    /// Unix ms of the first subscribe seen for this peer.
    pub joined_at: u64,
    /// Unix ms of the most recent subscribe. Drives subscriber expiry.
    pub last_seen: u64,
}

impl Subscriber {
    pub fn new(key: OverlayKey, addr: &NetworkAddress, now: u64) -> Self {
        Self {
            key,
            address: addr.host.clone(),
            port: addr.port,
            joined_at: now,
            last_seen: now,
        }
    }

    pub fn from_record(record: &PeerRecord, now: u64) -> Self {
        Self {
            key: record.key,
            address: record.address.clone(),
            port: record.port,
            joined_at: now,
            last_seen: now,
        }
    }

    /// Same (key, address, port). Timestamps do not take part.
    pub fn same_peer(&self, other: &Subscriber) -> bool {
        self.is(&other.key, &other.address, other.port)
    }

    pub fn is(&self, key: &OverlayKey, address: &str, port: u16) -> bool {
        self.key == *key && self.address == address && self.port == port
    }

    /// Advance `last_seen`; earlier timestamps are ignored.
    pub fn touch(&mut self, now: u64) {
        self.last_seen = self.last_seen.max(now);
    }

    pub fn is_stale(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > ttl_ms
    }

    pub fn to_record(&self) -> PeerRecord {
        PeerRecord {
            key: self.key,
            address: self.address.clone(),
            port: self.port,
        }
    }
}
