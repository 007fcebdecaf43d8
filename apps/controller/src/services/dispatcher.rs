// [apps/controller/src/services/dispatcher.rs]
//! The dispatcher (C5, §4.4): on each tick, resurrects due failures, fetches
//! assignable tasks, and places each one on a candidate device via the Place
//! protocol. `TaskRepository::assign`'s CAS is the sole linearization point
//! (§5, §8 property 1) — everything here is free to race against another
//! controller instance and simply lose the occasional CAS.

use std::collections::HashMap;
use std::time::Duration;

use distflow_domain_models::assignment::AssignmentStatus;
use distflow_domain_models::device::Device;
use distflow_domain_models::heartbeat::HeartbeatSample;
use distflow_domain_models::task::Task;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use crate::services::policy::{effective_policy, LoadBalancePolicy, PolicyState};
use crate::state::AppState;

const FETCH_LIMIT: i64 = 100;

/// Spawns the dispatch loop on `state.config.dispatch_interval_secs`.
pub fn spawn_dispatcher(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(state.config.dispatch_interval_secs.max(1)));
        let policy_state = PolicyState::new();
        info!("dispatcher: tick loop starting");

        loop {
            ticker.tick().await;
            if let Err(error) = run_dispatch_tick(&state, &policy_state).await {
                warn!(%error, "dispatcher: tick failed");
            }
        }
    });
}

#[instrument(skip(state, policy_state))]
async fn run_dispatch_tick(state: &AppState, policy_state: &PolicyState) -> anyhow::Result<()> {
    let resurrected = state.tasks.reset_due_failures().await?;
    if resurrected > 0 {
        debug!(count = resurrected, "dispatcher: resurrected failed tasks to pending");
    }

    let mut candidates = state.devices.list_available().await?;
    if candidates.is_empty() {
        return Ok(());
    }

    let counts = state.tasks.count_by_status().await?;
    let policy = effective_policy(&state.config, counts.pending);
    let tasks = state.tasks.fetch_assignable(None, FETCH_LIMIT).await?;

    // The weighted policy needs each candidate's latest heartbeat; fetched
    // once per tick rather than once per task since `candidates` only
    // shrinks (never grows) over the course of a tick.
    let weights = if policy == LoadBalancePolicy::Weighted {
        latest_weights(state, &candidates).await
    } else {
        HashMap::new()
    };

    for task in tasks {
        if candidates.is_empty() {
            break;
        }

        let eligible = eligible_candidates(state, &task, &candidates);
        if eligible.is_empty() {
            continue;
        }

        let weight_of = |device_id: &str| -> f64 {
            weights.get(device_id).copied().unwrap_or(50.0)
        };
        let Some(picked) = policy_state.pick(policy, &eligible, weight_of) else {
            continue;
        };
        let device_id = picked.device_id.clone();

        match place_task(state, &task, &device_id).await {
            Ok(true) => {
                if let Some(slot) = candidates.iter_mut().find(|d| d.device_id == device_id) {
                    slot.current_tasks += 1;
                    if slot.current_tasks >= slot.max_concurrent_tasks {
                        candidates.retain(|d| d.device_id != device_id);
                    }
                }
            }
            Ok(false) => {
                debug!(task_id = task.id, device_id, "dispatcher: CAS lost race, task already taken");
            }
            Err(error) => {
                warn!(%error, task_id = task.id, device_id, "dispatcher: placement failed");
            }
        }
    }

    Ok(())
}

/// Resolves each candidate's placement weight (§4.4) from its latest
/// heartbeat sample, falling back to the default weight when a device has
/// none yet recorded.
async fn latest_weights(state: &AppState, candidates: &[Device]) -> HashMap<String, f64> {
    let mut weights = HashMap::with_capacity(candidates.len());
    for device in candidates {
        let sample = state.heartbeats.latest_for_device(&device.device_id).await.unwrap_or_else(|error| {
            warn!(%error, device_id = %device.device_id, "dispatcher: failed to load heartbeat for weighted pick");
            None
        });
        weights.insert(device.device_id.clone(), HeartbeatSample::placement_weight(sample.as_ref()));
    }
    weights
}

/// Filters `candidates` for a task: capability match is required unless the
/// task's priority clears the configured force-dispatch threshold (§9).
fn eligible_candidates<'a>(state: &AppState, task: &Task, candidates: &'a [Device]) -> Vec<&'a Device> {
    let force = task.priority > state.config.force_dispatch_priority_threshold;
    candidates
        .iter()
        .filter(|d| force || d.capabilities.supports(&task.task_type))
        .collect()
}

/// The Place protocol (§4.4 step-by-step): CAS the task to `assigned`, open
/// an assignment row, bump the device counter; any failure after the CAS
/// succeeds rolls the task back to `pending` rather than leaving it
/// orphaned in `assigned` with no counter bump.
#[instrument(skip(state))]
pub async fn place_task(state: &AppState, task: &Task, device_id: &str) -> anyhow::Result<bool> {
    if !state.tasks.assign(task.id, device_id).await? {
        return Ok(false);
    }

    if let Err(error) = state.assignments.upsert_placement(task.id, device_id).await {
        warn!(%error, task_id = task.id, device_id, "dispatcher: assignment row failed, rolling back placement");
        state.tasks.release_single_task(task.id).await?;
        return Err(error.into());
    }

    if !state.devices.inc_counter(device_id).await? {
        warn!(task_id = task.id, device_id, "dispatcher: device saturated after pick, rolling back placement");
        state
            .assignments
            .close_with_reason(task.id, device_id, AssignmentStatus::Failed, "device saturated at placement time")
            .await?;
        state.tasks.release_single_task(task.id).await?;
        return Ok(false);
    }

    debug!(task_id = task.id, device_id, "dispatcher: task placed");
    Ok(true)
}
