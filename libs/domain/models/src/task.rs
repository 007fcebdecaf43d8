// [libs/domain/models/src/task.rs]
//! Task state machine (§3.2). This module only carries the row shape and
//! the pure backoff arithmetic; the transitions themselves live in the
//! store's task queue repository.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Done,
    Failed,
    /// Tombstone for tasks that were pending at the daily reset boundary.
    Zero,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Zero => "zero",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "running" => Ok(TaskStatus::Running),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            "zero" => Ok(TaskStatus::Zero),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status: TaskStatus,
    pub retry: u32,
    pub max_retry_count: u32,
    pub execution_timeout: i64,
    #[typeshare(serialized_as = "String")]
    pub next_run_at: DateTime<Utc>,
    pub assigned_device_id: Option<String>,
    #[typeshare(serialized_as = "String")]
    pub assigned_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
    #[typeshare(serialized_as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Terminal failure is `retry >= max_retry_count` (§3.2); a task with
    /// budget left is still eligible to be resurrected by `Fail`'s backoff.
    pub fn retry_budget_exhausted(&self) -> bool {
        self.retry >= self.max_retry_count
    }
}

const BACKOFF_BASE_SECS: u64 = 60;
const BACKOFF_CAP_SECS: u64 = 3600;

/// `delay(attempt) = min(base * 2^attempt, cap)`, §4.3. `attempt` is the
/// retry count *before* the failure that triggered this backoff (so the
/// first failure, which bumps retry 0 -> 1, calls this with `attempt = 0`
/// and gets the base 60s delay).
pub fn retry_backoff(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let scaled = BACKOFF_BASE_SECS.saturating_mul(factor);
    Duration::from_secs(scaled.min(BACKOFF_CAP_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_geometrically_then_caps() {
        assert_eq!(retry_backoff(0), Duration::from_secs(60));
        assert_eq!(retry_backoff(1), Duration::from_secs(120));
        assert_eq!(retry_backoff(2), Duration::from_secs(240));
        assert_eq!(retry_backoff(6), Duration::from_secs(3600));
        assert_eq!(retry_backoff(20), Duration::from_secs(3600));
    }

    #[test]
    fn retry_budget_tracks_max_retry_count() {
        let mut task = sample_task();
        task.max_retry_count = 2;
        task.retry = 1;
        assert!(!task.retry_budget_exhausted());
        task.retry = 2;
        assert!(task.retry_budget_exhausted());
    }

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            task_type: "fetch_report".into(),
            payload: serde_json::json!({}),
            priority: 0,
            status: TaskStatus::Pending,
            retry: 0,
            max_retry_count: 3,
            execution_timeout: 3600,
            next_run_at: now,
            assigned_device_id: None,
            assigned_at: None,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
