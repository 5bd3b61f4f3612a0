//! Search-group errors and the status codes carried in RPC responses.
//!
//! Every expected failure travels back to the caller as a `Status`; nothing
//! in the RPC path panics on malformed but well-typed input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SgError {
    /// The request carried an empty group key.
    #[error("unspecified search group")]
    UnspecifiedGroup,
    /// The group could not be found or created.
    #[error("unknown peer or group: {0}")]
    UnknownPeer(String),
    /// Unattributable sender or malformed snapshot.
    #[error("invalid replication: {0}")]
    InvalidReplication(String),
    /// The persisted group database could not be read or written.
    #[error("group storage: {0}")]
    Storage(String),
}

/// RPC status. Numeric codes are stable on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    UnspecifiedGroup,
    UnknownPeer,
    InvalidReplication,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 0,
            Status::UnspecifiedGroup => 1,
            Status::UnknownPeer => 2,
            Status::InvalidReplication => 3,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl From<&SgError> for Status {
    fn from(err: &SgError) -> Self {
        match err {
            SgError::UnspecifiedGroup => Status::UnspecifiedGroup,
            // A storage fault while finding a group is reported like any other
            // lookup failure.
            SgError::UnknownPeer(_) | SgError::Storage(_) => Status::UnknownPeer,
            SgError::InvalidReplication(_) => Status::InvalidReplication,
        }
    }
}
