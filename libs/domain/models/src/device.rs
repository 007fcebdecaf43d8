// [libs/domain/models/src/device.rs]
//! Worker device (§3.1). A device is a single worker process; it is never
//! deleted implicitly, only transitioned between online/busy/offline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Master,
    Worker,
    Standalone,
}

impl DeviceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceRole::Master => "master",
            DeviceRole::Worker => "worker",
            DeviceRole::Standalone => "standalone",
        }
    }
}

impl std::str::FromStr for DeviceRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "master" => Ok(DeviceRole::Master),
            "worker" => Ok(DeviceRole::Worker),
            "standalone" => Ok(DeviceRole::Standalone),
            other => Err(format!("unknown device role: {other}")),
        }
    }
}

/// online⇄busy are driven by the task counter; offline is driven by the
/// heartbeat collector's sweeper. See §3.1 lifecycle.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Busy,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Busy => "busy",
            DeviceStatus::Offline => "offline",
        }
    }

    /// Derives the correct status from the (current, max) task counter pair.
    /// `busy` is an equivalence class, not an independent state: see §3.1.
    pub fn from_load(current_tasks: u32, max_concurrent_tasks: u32) -> Self {
        if current_tasks >= max_concurrent_tasks && max_concurrent_tasks > 0 {
            DeviceStatus::Busy
        } else {
            DeviceStatus::Online
        }
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(DeviceStatus::Online),
            "busy" => Ok(DeviceStatus::Busy),
            "offline" => Ok(DeviceStatus::Offline),
            other => Err(format!("unknown device status: {other}")),
        }
    }
}

/// Free-form capability mapping (§3.1); `supported_task_types` is the one
/// field the dispatcher reads directly, everything else rides along as
/// opaque JSON for forward compatibility with executors the core doesn't
/// know about.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub supported_task_types: Vec<String>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Capabilities {
    pub fn supports(&self, task_type: &str) -> bool {
        self.supported_task_types.is_empty()
            || self.supported_task_types.iter().any(|t| t == task_type)
    }
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub device_type: DeviceRole,
    pub address: Option<String>,
    pub capabilities: Capabilities,
    pub max_concurrent_tasks: u32,
    pub current_tasks: u32,
    pub status: DeviceStatus,
    #[typeshare(serialized_as = "String")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
    #[typeshare(serialized_as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// True when a device still has headroom. Note that "recently seen"
    /// for listing purposes uses a shorter window than the sweeper's
    /// offline threshold; this method only checks capacity.
    pub fn has_spare_capacity(&self) -> bool {
        self.current_tasks < self.max_concurrent_tasks
    }
}
