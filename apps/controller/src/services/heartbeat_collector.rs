// [apps/controller/src/services/heartbeat_collector.rs]
//! Heartbeat collector sweeper (C3, §4.2). Ingestion itself happens inline
//! in the `POST /devices/{id}/heartbeat` handler — this service only runs
//! the periodic offline sweep: a device whose `last_heartbeat` has aged
//! past `offline_timeout` is marked offline, its open tasks are released
//! back to `pending`, and its task counter resets to zero.

use std::time::Duration;

use distflow_domain_models::assignment::AssignmentStatus;
use distflow_domain_models::device::DeviceStatus;
use tokio::time::interval;
use tracing::{info, instrument, warn};

use crate::state::AppState;

/// Swept on a fixed 60s cadence regardless of `dispatch_interval_secs` —
/// liveness detection doesn't need to track the dispatcher's pacing, only
/// `offline_timeout` itself (§4.2).
const SWEEP_INTERVAL_SECS: u64 = 60;

pub fn spawn_heartbeat_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        info!("heartbeat collector: sweep loop starting");

        loop {
            ticker.tick().await;
            if let Err(error) = run_sweep(&state).await {
                warn!(%error, "heartbeat collector: sweep failed");
            }
        }
    });
}

#[instrument(skip(state))]
async fn run_sweep(state: &AppState) -> anyhow::Result<()> {
    let timed_out = state.devices.list_timed_out(state.config.offline_timeout_secs).await?;

    for device in timed_out {
        state.devices.set_status(&device.device_id, DeviceStatus::Offline).await?;

        let released = state.tasks.release_device_tasks(&device.device_id).await?;
        if released > 0 {
            state
                .assignments
                .close_all_open_for_device(&device.device_id, AssignmentStatus::Failed, "device went offline")
                .await?;
        }
        state.devices.reset_counter(&device.device_id).await?;

        warn!(device_id = %device.device_id, released, "heartbeat collector: device marked offline");
    }

    Ok(())
}
