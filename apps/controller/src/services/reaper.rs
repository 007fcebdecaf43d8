// [apps/controller/src/services/reaper.rs]
//! Timeout reaper (C7, §4.5). Runs on every dispatch tick: open assignments
//! whose age exceeds the task's own `execution_timeout` (or the configured
//! default when a task carries none) are marked `timeout`, the device
//! counter is released, and the task is either requeued with backoff or
//! left `failed` once its retry budget is spent.

use std::time::Duration;

use distflow_domain_models::assignment::AssignmentStatus;
use distflow_domain_models::task::retry_backoff;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use crate::state::AppState;

/// Spawns the reaper loop on the same cadence as the dispatcher (§4.5: "runs
/// every dispatch tick").
pub fn spawn_reaper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(state.config.dispatch_interval_secs.max(1)));
        info!("reaper: tick loop starting");

        loop {
            ticker.tick().await;
            if let Err(error) = run_reaper_tick(&state).await {
                warn!(%error, "reaper: tick failed");
            }
        }
    });
}

#[instrument(skip(state))]
async fn run_reaper_tick(state: &AppState) -> anyhow::Result<()> {
    // Fetching with a zero age pulls every open (assigned/running) task with
    // an `assigned_at` in the past — i.e. all of them — so the per-task
    // `execution_timeout` filter below is what actually decides timeout,
    // not this query.
    let open_tasks = state.tasks.list_timed_out(Duration::ZERO).await?;
    let now = chrono::Utc::now();
    let mut reaped = 0u64;

    for task in open_tasks {
        let Some(assigned_at) = task.assigned_at else { continue };
        let Some(device_id) = task.assigned_device_id.clone() else { continue };

        let timeout_secs = if task.execution_timeout > 0 {
            task.execution_timeout
        } else {
            state.config.default_execution_timeout_secs
        };

        let age = now.signed_duration_since(assigned_at);
        if age.num_seconds() < timeout_secs {
            continue;
        }

        state
            .assignments
            .close_with_reason(task.id, &device_id, AssignmentStatus::Timeout, "reaper: execution timeout exceeded")
            .await?;
        state.devices.dec_counter(&device_id).await?;

        if task.retry_budget_exhausted() {
            state.tasks.fail(task.id, Some("execution timeout, retry budget exhausted"), Duration::from_secs(0)).await?;
        } else {
            let delay = retry_backoff(task.retry);
            state.tasks.fail(task.id, Some("execution timeout"), delay).await?;
        }

        reaped += 1;
        debug!(task_id = task.id, device_id, "reaper: reclaimed timed-out assignment");
    }

    if reaped > 0 {
        warn!(count = reaped, "reaper: reclaimed timed-out assignments");
    }
    Ok(())
}
