//! HTTP API handlers. Search-group RPCs and node state as JSON.

pub mod groups;
pub mod rpc;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use cairn_core::OverlayKey;
use cairn_services::{OverlayNode, StaticRouting};

#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<OverlayNode>,
    /// Concrete routing handle, needed for operator-triggered regeneration.
    pub routing: Arc<StaticRouting>,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(
        node: Arc<OverlayNode>,
        routing: Arc<StaticRouting>,
        shutdown_tx: tokio::sync::broadcast::Sender<()>,
    ) -> Self {
        Self {
            node,
            routing,
            shutdown_tx,
            started_at: Instant::now(),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Parse a hex-encoded 20-byte group key.
fn parse_key(hex_str: &str) -> Result<OverlayKey, (StatusCode, String)> {
    let key: OverlayKey = hex_str
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e}")))?;
    if key.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "group key is empty".to_string()));
    }
    Ok(key)
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// Re-export handler functions for use in router setup.
pub use groups::{handle_group_inspect, handle_groups};
pub use rpc::{handle_replicate, handle_subscribe};
pub use status::{handle_regenerate, handle_shutdown, handle_status, handle_sweep};
