// [libs/domain/models/src/heartbeat.rs]
//! One time-series sample per device (§3.4). Samples are append-only and
//! monotonically timestamped per device; the collector never assumes
//! samples from different devices are ordered against each other (§5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSample {
    pub device_id: String,
    #[typeshare(serialized_as = "String")]
    pub t: DateTime<Utc>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub network_status: String,
    pub running_tasks: u32,
    pub system_load: Option<f64>,
    pub error_count: u32,
    pub status_info: Option<String>,
}

impl HeartbeatSample {
    /// Weight used by the `weighted` dispatch policy: `max(1, 100 -
    /// (cpu% + mem%)/2)`, default 50 when a sample is absent (§4.4).
    pub fn placement_weight(sample: Option<&HeartbeatSample>) -> f64 {
        match sample {
            Some(s) => {
                let cpu = s.cpu_usage.unwrap_or(0.0);
                let mem = s.memory_usage.unwrap_or(0.0);
                (100.0 - (cpu + mem) / 2.0).max(1.0)
            }
            None => 50.0,
        }
    }
}
