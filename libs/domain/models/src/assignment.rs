// [libs/domain/models/src/assignment.rs]
//! Append-only `(task, device, attempt)` record (§3.3). `(task_id,
//! device_id)` is unique; a re-dispatch to the same device reuses the row
//! rather than inserting a second one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Running => "running",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Failed => "failed",
            AssignmentStatus::Timeout => "timeout",
        }
    }

    /// Open == not yet a terminal attempt outcome.
    pub fn is_open(self) -> bool {
        matches!(self, AssignmentStatus::Assigned | AssignmentStatus::Running)
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "running" => Ok(AssignmentStatus::Running),
            "completed" => Ok(AssignmentStatus::Completed),
            "failed" => Ok(AssignmentStatus::Failed),
            "timeout" => Ok(AssignmentStatus::Timeout),
            other => Err(format!("unknown assignment status: {other}")),
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub task_id: i64,
    pub device_id: String,
    pub status: AssignmentStatus,
    pub retry_count: u32,
    #[typeshare(serialized_as = "String")]
    pub assigned_at: DateTime<Utc>,
    #[typeshare(serialized_as = "String")]
    pub started_at: Option<DateTime<Utc>>,
    #[typeshare(serialized_as = "String")]
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_data: Option<serde_json::Value>,
}
