// [libs/domain/models/src/api.rs]
//! Wire payloads for the control surface (§6.1). Shared between
//! `distflow-infra-worker-client` (which sends them) and the controller's
//! handlers (which receive them) so the two sides can never drift.

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::device::Capabilities;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub ip_address: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,
}

fn default_max_concurrent_tasks() -> u32 {
    1
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub device_id: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub network_status: String,
    pub running_tasks: u32,
    pub system_load: Option<f64>,
    #[serde(default)]
    pub error_count: u32,
    pub status_info: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: Option<i32>,
    pub execution_timeout: Option<i64>,
    pub max_retry_count: Option<u32>,
    #[typeshare(serialized_as = "String")]
    pub next_run_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTaskRequest {
    pub task_id: i64,
    pub device_id: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub task_id: i64,
    pub device_id: String,
    pub status: String,
    pub error_message: Option<String>,
    pub result_data: Option<serde_json::Value>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: i64,
    pub assigned: i64,
    pub running: i64,
    pub done: i64,
    pub failed: i64,
    pub zero: i64,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub online: i64,
    pub busy: i64,
    pub offline: i64,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsOverview {
    pub tasks: TaskCounts,
    pub devices: DeviceCounts,
}
