//! Overlay keys: fixed-length identifiers for nodes, groups, and subscribers.
//!
//! A key is 160 bits. The all-zero key has no bits set and is "empty": it
//! never names a routable entity, and requests carrying it are rejected.
//! Ordering is bit-wise, most significant bit first, which is the same as
//! lexicographic byte order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key length in bytes.
pub const KEY_BYTES: usize = 20;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayKey([u8; KEY_BYTES]);

impl OverlayKey {
    /// The empty key (no bits set).
    pub const EMPTY: OverlayKey = OverlayKey([0u8; KEY_BYTES]);

    pub const fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice. Returns None unless the slice is exactly
    /// `KEY_BYTES` long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; KEY_BYTES] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Derive a key from a topic name: BLAKE3 of the name, truncated to 160 bits.
    pub fn from_name(name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes());
        let mut arr = [0u8; KEY_BYTES];
        arr.copy_from_slice(&hash.as_bytes()[..KEY_BYTES]);
        Self(arr)
    }

    /// A uniformly random key.
    pub fn random() -> Self {
        let mut arr = [0u8; KEY_BYTES];
        rand::Rng::fill(&mut rand::thread_rng(), &mut arr[..]);
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count_ones() == 0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for OverlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for OverlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OverlayKey({})", self.short())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("key must be 20 bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for OverlayKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(KeyParseError::WrongLength(bytes.len()))
    }
}

// Keys travel as hex strings in JSON. An empty string is the empty key.
impl Serialize for OverlayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for OverlayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::EMPTY);
        }
        s.parse().map_err(serde::de::Error::custom)
    }
}
