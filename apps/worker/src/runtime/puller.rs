// [apps/worker/src/runtime/puller.rs]
//! Task puller (§4.7). Claims as many execution slots as are free, asks
//! the controller for that many already-assigned tasks, and hands each
//! one to the executor pool. An empty pull is not an error — the loop
//! just sleeps the configured idle period and tries again.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::runtime::executor_pool::run_task;
use crate::state::WorkerState;

const MAX_PULL_LIMIT: u32 = 10;

pub fn spawn_task_puller(state: WorkerState) {
    tokio::spawn(async move {
        let device_id = state.device_id.as_str().to_string();
        info!(device_id, "task puller: loop starting");

        loop {
            let available = state.slots.available_permits() as u32;
            if available == 0 {
                sleep(Duration::from_secs(state.config.pull_idle_secs.max(1))).await;
                continue;
            }

            let limit = available.min(MAX_PULL_LIMIT);
            match state.client.pull_assigned_tasks(&device_id, limit).await {
                Ok(tasks) if tasks.is_empty() => {
                    sleep(Duration::from_secs(state.config.pull_idle_secs.max(1))).await;
                }
                Ok(tasks) => {
                    debug!(device_id, pulled = tasks.len(), "task puller: claimed work");
                    for task in tasks {
                        let Ok(permit) = state.slots.clone().try_acquire_owned() else {
                            // Slots filled between the availability check and here;
                            // the task stays assigned and is picked up on the next pull.
                            break;
                        };
                        tokio::spawn(run_task(state.clone(), permit, task));
                    }
                }
                Err(error) => {
                    warn!(device_id, %error, "task puller: pull failed");
                    sleep(Duration::from_secs(state.config.pull_idle_secs.max(1))).await;
                }
            }
        }
    });
}
