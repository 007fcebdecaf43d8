// [apps/worker/src/runtime/executor_pool.rs]
//! Per-task execution (§4.7 executor). One of these runs per pulled task,
//! under a permit acquired from `WorkerState::slots`; the permit is held
//! for the whole call and dropped on return, which is what bounds the
//! pool to `concurrent_tasks` (§5).

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use distflow_domain_models::api::UpdateTaskStatusRequest;
use distflow_domain_models::task::Task;
use futures::FutureExt;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, info, instrument, warn};

use crate::executor::ExecutorError;
use crate::state::WorkerState;

#[instrument(skip(state, permit, task), fields(task_id = task.id, task_type = %task.task_type))]
pub async fn run_task(state: WorkerState, permit: OwnedSemaphorePermit, task: Task) {
    let device_id = state.device_id.as_str().to_string();

    if let Err(error) = report_status(&state, &device_id, task.id, "running", None, None).await {
        warn!(task_id = task.id, %error, "executor pool: running report failed, proceeding anyway");
    }

    let Some(executor) = state.executors.get(&task.task_type) else {
        let message = ExecutorError::Unregistered(task.task_type.clone()).to_string();
        error!(task_id = task.id, task_type = %task.task_type, "executor pool: no executor registered");
        report_and_log(&state, &device_id, task.id, "failed", Some(&message), None).await;
        drop(permit);
        return;
    };

    let started = Instant::now();
    let payload = task.payload.clone();
    let outcome = AssertUnwindSafe(executor.execute(payload)).catch_unwind().await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(result)) => {
            info!(task_id = task.id, elapsed_ms = elapsed.as_millis() as u64, "executor pool: task completed");
            report_and_log(&state, &device_id, task.id, "done", None, Some(result)).await;
        }
        Ok(Err(failure)) => {
            warn!(task_id = task.id, %failure, "executor pool: task failed");
            report_and_log(&state, &device_id, task.id, "failed", Some(&failure.to_string()), None).await;
        }
        Err(_panic) => {
            let message = ExecutorError::Panicked.to_string();
            error!(task_id = task.id, "executor pool: executor panicked, contained at the task boundary");
            report_and_log(&state, &device_id, task.id, "failed", Some(&message), None).await;
        }
    }

    drop(permit);
}

async fn report_and_log(
    state: &WorkerState,
    device_id: &str,
    task_id: i64,
    status: &str,
    error_message: Option<&str>,
    result_data: Option<serde_json::Value>,
) {
    if let Err(error) = report_status(state, device_id, task_id, status, error_message, result_data).await {
        error!(task_id, status, %error, "executor pool: status report failed, task will be recovered by reaper");
    }
}

async fn report_status(
    state: &WorkerState,
    device_id: &str,
    task_id: i64,
    status: &str,
    error_message: Option<&str>,
    result_data: Option<serde_json::Value>,
) -> Result<(), distflow_infra_worker_client::ClientError> {
    let request = UpdateTaskStatusRequest {
        task_id,
        device_id: device_id.to_string(),
        status: status.to_string(),
        error_message: error_message.map(str::to_string),
        result_data,
    };
    state.client.report_task_status(&request).await
}
