// [apps/controller/src/handlers/management.rs]
//! Admin/maintenance endpoints (§4.6, §6.1): on-demand rebalance, retention
//! cleanup, and the stats overview dashboard feed rely on.

use axum::extract::State;
use axum::Json;
use distflow_domain_models::api::{DeviceCounts, StatsOverview};
use distflow_domain_models::device::DeviceStatus;
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, ApiResult};
use crate::services::rebalancer::{rebalance, RebalanceReport};
use crate::state::AppState;

pub async fn trigger_rebalance(State(state): State<AppState>) -> ApiResult<Json<RebalanceReport>> {
    let report = rebalance(&state).await.map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub heartbeats_deleted: u64,
    pub assignments_deleted: u64,
}

/// Deletes heartbeats older than `days` and closed assignments older than
/// `4 * days`, matching the wider assignment-ledger retention window noted
/// in the workspace's retention policy.
pub async fn cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<Json<CleanupReport>> {
    if request.days <= 0 {
        return Err(ApiError::Validation("days must be positive".into()));
    }

    let heartbeats_deleted = state.heartbeats.purge_older_than(Some(request.days)).await?;
    let assignments_deleted = state.assignments.delete_closed_older_than(request.days * 4).await?;

    Ok(Json(CleanupReport { heartbeats_deleted, assignments_deleted }))
}

#[derive(Debug, Serialize)]
pub struct ResetFailedReport {
    pub reset_count: u64,
}

/// Admin-only `failed -> pending` reopen, distinct from the daily
/// `ZeroPending` scheduler (§9 open question on reset semantics).
pub async fn reset_failed(State(state): State<AppState>) -> ApiResult<Json<ResetFailedReport>> {
    let reset_count = state.tasks.reset_failed().await?;
    Ok(Json(ResetFailedReport { reset_count }))
}

pub async fn stats_overview(State(state): State<AppState>) -> ApiResult<Json<StatsOverview>> {
    let tasks = state.tasks.count_by_status().await?;

    let devices = state.devices.list(None).await?;
    let mut device_counts = DeviceCounts::default();
    for device in devices {
        match device.status {
            DeviceStatus::Online => device_counts.online += 1,
            DeviceStatus::Busy => device_counts.busy += 1,
            DeviceStatus::Offline => device_counts.offline += 1,
        }
    }

    Ok(Json(StatsOverview { tasks, devices: device_counts }))
}
