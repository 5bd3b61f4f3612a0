//! /status, /sweep, /vnodes/regenerate, /daemon/shutdown handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use cairn_services::RoutingNode;

use super::{internal, ApiState};

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub node_key: String,
    pub address: String,
    pub vnodes: Vec<String>,
    pub vnode_generation: u64,
    pub groups: usize,
    pub subscribers: usize,
    /// Records in the on-disk group database; `None` when persistence is off.
    pub persisted_groups: Option<usize>,
    pub max_returned_peers: usize,
    pub group_ttl_secs: u64,
    pub uptime_secs: u64,
}

pub async fn handle_status(
    State(state): State<ApiState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let node = state.node.clone();
    // Counting takes every group lock and lists the store directory.
    let (groups, subscribers, persisted_groups) = tokio::task::spawn_blocking(move || {
        let manager = node.manager();
        (
            manager.len(),
            manager.subscriber_count(),
            manager.store().map(|s| s.count()),
        )
    })
    .await
    .map_err(internal)?;

    let node = &state.node;
    let keys = state.routing.node_keys();
    Ok(Json(StatusResponse {
        node_key: state.routing.node_key().to_hex(),
        address: state.routing.net_address().to_string(),
        vnodes: keys.iter().skip(1).map(|k| k.to_hex()).collect(),
        vnode_generation: state.routing.generation(),
        groups,
        subscribers,
        persisted_groups,
        max_returned_peers: node.max_returned_peers(),
        group_ttl_secs: node.sweeper().ttl_ms() / 1000,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

// ── /sweep (POST) ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SweepResponse {
    pub groups_removed: usize,
    pub subscribers_removed: usize,
    pub remaining: usize,
}

pub async fn handle_sweep(
    State(state): State<ApiState>,
) -> Result<Json<SweepResponse>, (StatusCode, String)> {
    let node = state.node.clone();
    let stats = tokio::task::spawn_blocking(move || node.sweeper().sweep())
        .await
        .map_err(internal)?;
    tracing::info!(
        groups = stats.groups_removed,
        subscribers = stats.subscribers_removed,
        "sweep triggered via CLI"
    );
    Ok(Json(SweepResponse {
        groups_removed: stats.groups_removed,
        subscribers_removed: stats.subscribers_removed,
        remaining: state.node.manager().len(),
    }))
}

// ── /vnodes/regenerate (POST) ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RegenerateResponse {
    pub generation: u64,
    pub vnodes: Vec<String>,
}

pub async fn handle_regenerate(State(state): State<ApiState>) -> Json<RegenerateResponse> {
    // The node's vnode watcher drops the group database in response.
    let generation = state.routing.regenerate();
    let vnodes = state
        .routing
        .node_keys()
        .iter()
        .skip(1)
        .map(|k| k.to_hex())
        .collect();
    Json(RegenerateResponse { generation, vnodes })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    if state.shutdown_tx.send(()).is_err() {
        tracing::warn!("no shutdown listeners");
    }
    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
