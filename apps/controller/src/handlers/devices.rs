// [apps/controller/src/handlers/devices.rs]
//! Device registry endpoints (§4.1, §6.1).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use distflow_domain_models::api::{HeartbeatRequest, RegisterDeviceRequest};
use distflow_domain_models::device::{Device, DeviceRole, DeviceStatus};
use distflow_domain_models::device_id::is_valid_device_id;
use distflow_domain_models::heartbeat::HeartbeatSample;
use distflow_domain_models::task::Task;
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListDevicesQuery {
    pub status: Option<String>,
}

pub async fn register_device(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    if !is_valid_device_id(&request.device_id) {
        return Err(ApiError::Validation(format!("invalid device_id: {}", request.device_id)));
    }
    let device_type = DeviceRole::from_str(&request.device_type)
        .map_err(ApiError::Validation)?;

    state
        .devices
        .register(
            &request.device_id,
            &request.device_name,
            device_type,
            request.ip_address.as_deref(),
            &request.capabilities,
            request.max_concurrent_tasks,
        )
        .await?;

    let device = state
        .devices
        .get(&request.device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(request.device_id.clone()))?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<ListDevicesQuery>,
) -> ApiResult<Json<Vec<Device>>> {
    let status = query
        .status
        .map(|s| DeviceStatus::from_str(&s))
        .transpose()
        .map_err(ApiError::Validation)?;
    let devices = state.devices.list(status).await?;
    Ok(Json(devices))
}

/// §6.1 `GET /devices/{id}`: the device row plus its latest heartbeat
/// sample and its currently open (assigned or running) tasks.
#[derive(Debug, Serialize)]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub device: Device,
    pub latest_heartbeat: Option<HeartbeatSample>,
    pub open_tasks: Vec<Task>,
    pub open_task_count: usize,
}

pub async fn get_device(State(state): State<AppState>, Path(device_id): Path<String>) -> ApiResult<Json<DeviceDetail>> {
    let device = state
        .devices
        .get(&device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(device_id.clone()))?;
    let latest_heartbeat = state.heartbeats.latest_for_device(&device_id).await?;
    let open_tasks = state.tasks.list_by_device(&device_id).await?;
    let open_task_count = open_tasks.len();

    Ok(Json(DeviceDetail { device, latest_heartbeat, open_tasks, open_task_count }))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(request): Json<HeartbeatRequest>,
) -> ApiResult<StatusCode> {
    if request.device_id != device_id {
        return Err(ApiError::Validation("device_id in path and body must match".into()));
    }

    state.devices.update_heartbeat(&device_id, Some(request.running_tasks)).await?;

    let sample = HeartbeatSample {
        device_id: device_id.clone(),
        t: chrono::Utc::now(),
        cpu_usage: request.cpu_usage,
        memory_usage: request.memory_usage,
        disk_usage: request.disk_usage,
        network_status: request.network_status,
        running_tasks: request.running_tasks,
        system_load: request.system_load,
        error_count: request.error_count,
        status_info: request.status_info,
    };
    state.heartbeats.record(&sample).await?;

    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceStatusRequest {
    pub status: String,
}

pub async fn set_device_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(request): Json<UpdateDeviceStatusRequest>,
) -> ApiResult<StatusCode> {
    let status = DeviceStatus::from_str(&request.status).map_err(ApiError::Validation)?;
    state.devices.set_status(&device_id, status).await?;
    Ok(StatusCode::OK)
}
