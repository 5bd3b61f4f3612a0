//! CLI command modules.

pub mod groups;
pub mod http;
pub mod status;
pub mod subscribe;

use cairn_core::OverlayKey;

/// A 40-character hex string is taken as a group key; anything else is a
/// topic name hashed into one.
pub fn resolve_group(arg: &str) -> OverlayKey {
    match arg.parse::<OverlayKey>() {
        Ok(key) if !key.is_empty() => key,
        _ => OverlayKey::from_name(arg),
    }
}
