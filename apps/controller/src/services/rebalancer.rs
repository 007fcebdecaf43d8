// [apps/controller/src/services/rebalancer.rs]
//! Rebalancer (C8, §4.6). On-demand only — triggered by
//! `POST /management/rebalance`, never by a timer. Snapshots device load,
//! computes `avg = total / num_devices`, and moves up to
//! `⌊current_tasks - avg⌋` open tasks off each overloaded device onto the
//! least-loaded device with spare capacity, reusing the Place protocol for
//! the actual move.

use distflow_domain_models::assignment::AssignmentStatus;
use distflow_domain_models::device::DeviceStatus;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::services::dispatcher::place_task;
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
pub struct RebalanceReport {
    pub devices_considered: usize,
    pub tasks_moved: u64,
}

#[instrument(skip(state))]
pub async fn rebalance(state: &AppState) -> anyhow::Result<RebalanceReport> {
    let all_devices = state.devices.list(None).await?;
    let active: Vec<_> = all_devices.into_iter().filter(|d| d.status != DeviceStatus::Offline).collect();

    if active.len() < 2 {
        return Ok(RebalanceReport { devices_considered: active.len(), tasks_moved: 0 });
    }

    let total: u32 = active.iter().map(|d| d.current_tasks).sum();
    let avg = total as f64 / active.len() as f64;

    let mut overloaded: Vec<_> = active.iter().filter(|d| (d.current_tasks as f64) > avg + 1.0).cloned().collect();
    overloaded.sort_by(|a, b| b.current_tasks.cmp(&a.current_tasks));

    // In-memory running counts for underloaded targets, so a target is
    // dropped from the pool as soon as it reaches `avg` without a DB
    // round-trip per move (§4.6 step 4).
    let mut underloaded: Vec<_> = active
        .iter()
        .filter(|d| (d.current_tasks as f64) < avg - 1.0 && d.current_tasks < d.max_concurrent_tasks)
        .map(|d| (d.device_id.clone(), d.current_tasks))
        .collect();

    let mut moved = 0u64;

    for source in overloaded {
        let excess = (source.current_tasks as f64 - avg).floor() as i64;
        if excess <= 0 {
            continue;
        }

        let open_tasks = state.tasks.list_by_device(&source.device_id).await?;
        let mut budget = excess;

        for task in open_tasks {
            if budget <= 0 {
                break;
            }

            underloaded.sort_by_key(|(_, count)| *count);
            let Some((target_id, target_count)) = underloaded.first().cloned() else { break };

            state
                .assignments
                .close_with_reason(task.id, &source.device_id, AssignmentStatus::Failed, "rebalanced")
                .await?;
            state.tasks.release_single_task(task.id).await?;
            state.devices.dec_counter(&source.device_id).await?;

            match place_task(state, &task, &target_id).await {
                Ok(true) => {
                    moved += 1;
                    budget -= 1;
                    let new_count = target_count + 1;
                    if (new_count as f64) >= avg {
                        underloaded.retain(|(id, _)| *id != target_id);
                    } else if let Some(entry) = underloaded.iter_mut().find(|(id, _)| *id == target_id) {
                        entry.1 = new_count;
                    }
                }
                Ok(false) => {
                    // Task is back in `pending`; a dispatch tick will pick
                    // it up as usual. Not an error, just a lost race.
                    break;
                }
                Err(error) => {
                    warn!(%error, task_id = task.id, "rebalancer: move failed, task left pending");
                    break;
                }
            }
        }
    }

    info!(moved, devices = active.len(), "rebalancer: run complete");
    Ok(RebalanceReport { devices_considered: active.len(), tasks_moved: moved })
}
