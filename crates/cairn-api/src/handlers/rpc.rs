//! /rpc handlers: inbound search-group RPCs from peers.
//!
//! Protocol outcomes travel in the response `status`; only transport-level
//! failures become HTTP errors.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use cairn_core::{ReplicateRequest, ReplicateResponse, SubscribeRequest, SubscribeResponse};
use cairn_services::SearchGroupRpc;

use super::{internal, ApiState};

// ── /rpc/subscribe (POST) ─────────────────────────────────────────────────────

pub async fn handle_subscribe(
    State(state): State<ApiState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, (StatusCode, String)> {
    // Handlers take blocking locks and may touch disk.
    let node = state.node.clone();
    let resp = tokio::task::spawn_blocking(move || node.subscribe(&req))
        .await
        .map_err(internal)?;
    Ok(Json(resp))
}

// ── /rpc/replicate (POST) ─────────────────────────────────────────────────────

pub async fn handle_replicate(
    State(state): State<ApiState>,
    Json(req): Json<ReplicateRequest>,
) -> Result<Json<ReplicateResponse>, (StatusCode, String)> {
    let node = state.node.clone();
    let resp = tokio::task::spawn_blocking(move || node.replicate(&req))
        .await
        .map_err(internal)?;
    Ok(Json(resp))
}
