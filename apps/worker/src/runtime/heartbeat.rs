// [apps/worker/src/runtime/heartbeat.rs]
//! Heartbeat sender (§4.7). Fires on a fixed interval regardless of what
//! the puller/executors are doing; a slow or wedged executor never blocks
//! this loop because it shares no lock with it, only the atomics it reads
//! to report `running_tasks`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use distflow_domain_models::api::HeartbeatRequest;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::WorkerState;

pub fn spawn_heartbeat_sender(state: WorkerState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(state.config.heartbeat_interval_secs.max(1)));
        info!(device_id = %state.device_id, "heartbeat sender: loop starting");

        loop {
            ticker.tick().await;
            send_one(&state).await;
        }
    });
}

async fn send_one(state: &WorkerState) {
    let request = HeartbeatRequest {
        device_id: state.device_id.as_str().to_string(),
        cpu_usage: None,
        memory_usage: None,
        disk_usage: None,
        network_status: if state.disconnected.load(Ordering::Relaxed) { "degraded".into() } else { "ok".into() },
        running_tasks: state.in_flight(),
        system_load: None,
        error_count: state.heartbeat_errors.load(Ordering::Relaxed),
        status_info: None,
    };

    match state.client.send_heartbeat(&request).await {
        Ok(()) => {
            state.heartbeat_errors.store(0, Ordering::Relaxed);
            if state.disconnected.swap(false, Ordering::Relaxed) {
                info!(device_id = %state.device_id, "heartbeat sender: reconnected to controller");
            }
            debug!(device_id = %state.device_id, running_tasks = request.running_tasks, "heartbeat sent");
        }
        Err(error) => {
            let errors = state.heartbeat_errors.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(device_id = %state.device_id, %error, errors, "heartbeat sender: send failed");

            if errors >= state.config.max_consecutive_heartbeat_errors {
                if !state.disconnected.swap(true, Ordering::Relaxed) {
                    warn!(
                        device_id = %state.device_id,
                        errors,
                        "heartbeat sender: marking self disconnected after consecutive failures, still retrying"
                    );
                }
            }
        }
    }
}
