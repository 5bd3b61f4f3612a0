//! /groups handlers: inspect locally held search groups.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use cairn_core::{GroupSnapshot, SgError, Status};
use cairn_services::now_ms;

use super::{internal, parse_key, ApiState};

// ── /groups (GET) ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<GroupSummary>,
}

#[derive(Serialize)]
pub struct GroupSummary {
    pub group_key: String,
    pub subscribers: usize,
    pub replication_radius: u32,
    pub last_time_of_use: u64,
}

pub async fn handle_groups(
    State(state): State<ApiState>,
) -> Result<Json<GroupsResponse>, (StatusCode, String)> {
    let node = state.node.clone();
    let snapshots = tokio::task::spawn_blocking(move || node.manager().snapshots())
        .await
        .map_err(internal)?;
    let groups = snapshots
        .into_iter()
        .map(|s| GroupSummary {
            group_key: s.group_key.to_hex(),
            subscribers: s.subscribers.len(),
            replication_radius: s.replication_radius,
            last_time_of_use: s.last_time_of_use,
        })
        .collect();
    Ok(Json(GroupsResponse { groups }))
}

// ── /groups/{key} (GET) ───────────────────────────────────────────────────────

pub async fn handle_group_inspect(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<GroupSnapshot>, (StatusCode, String)> {
    let key = parse_key(&key)?;
    let node = state.node.clone();

    // Falls through to the on-disk database without creating anything.
    let snapshot = tokio::task::spawn_blocking(move || -> Result<Option<GroupSnapshot>, SgError> {
        node.manager().with_existing(&key, now_ms(), |g| g.snapshot())
    })
    .await
    .map_err(internal)?
    .map_err(|e| {
        let status = Status::from(&e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{status:?}: {e}"))
    })?;

    snapshot
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "group not found".to_string()))
}
