//! Peer network addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host and port of a peer.
///
/// An empty host is the "unspecified" address: a sender that does not
/// disclose itself. Subscribe treats it as a query-only request and
/// replicate rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn unspecified() -> Self {
        Self::default()
    }

    pub fn is_unspecified(&self) -> bool {
        self.host.trim().is_empty()
    }

    /// Parse `host:port`. IPv6 hosts may be bracketed (`[::1]:9100`).
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        let port = port.parse().ok()?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port))
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unspecified() {
            return f.write_str("<unspecified>");
        }
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
