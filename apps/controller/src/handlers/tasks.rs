// [apps/controller/src/handlers/tasks.rs]
//! Task queue and placement endpoints (§4.3, §4.4, §6.1).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use distflow_domain_models::api::{AssignTaskRequest, CreateTaskRequest, UpdateTaskStatusRequest};
use distflow_domain_models::assignment::{Assignment, AssignmentStatus};
use distflow_domain_models::task::{retry_backoff, Task, TaskStatus};
use distflow_infra_store::NewTask;
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, ApiResult};
use crate::services::dispatcher::place_task;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_PULL_LIMIT: u32 = 10;

pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let new_task = NewTask {
        task_type: request.task_type,
        payload: request.payload,
        priority: request.priority.unwrap_or(0),
        execution_timeout: request.execution_timeout.unwrap_or(3600),
        max_retry_count: request.max_retry_count.unwrap_or(3),
        next_run_at: request.next_run_at,
    };

    let ids = state.tasks.add(vec![new_task]).await?;
    let id = *ids.first().ok_or_else(|| ApiError::Validation("task insert returned no id".into()))?;
    let task = state.tasks.get(id).await?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub task_type: Option<String>,
    pub device_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let status = query.status.map(|s| TaskStatus::from_str(&s)).transpose().map_err(ApiError::Validation)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);
    let tasks = state
        .tasks
        .list(status, query.task_type.as_deref(), query.device_id.as_deref(), limit)
        .await?;
    Ok(Json(tasks))
}

/// §6.1 `GET /tasks/{id}`: the task row plus its full assignment ledger,
/// not just the latest attempt.
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub assignments: Vec<Assignment>,
}

pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<i64>) -> ApiResult<Json<TaskDetail>> {
    let task = state.tasks.get(task_id).await?.ok_or_else(|| ApiError::NotFound(task_id.to_string()))?;
    let assignments = state.assignments.list_for_task(task_id).await?;
    Ok(Json(TaskDetail { task, assignments }))
}

pub async fn assign_task(
    State(state): State<AppState>,
    Json(request): Json<AssignTaskRequest>,
) -> ApiResult<StatusCode> {
    let task = state
        .tasks
        .get(request.task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(request.task_id.to_string()))?;

    let placed = place_task(&state, &task, &request.device_id).await.map_err(|e| ApiError::Validation(e.to_string()))?;
    if placed {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::Conflict(format!("task {} is no longer pending", request.task_id)))
    }
}

/// Worker status reports (§4.7 task puller's counterpart). `status` is one
/// of `running`, `done`, `failed` — `pending`/`assigned`/`zero` are not
/// valid reports from a worker and are rejected.
pub async fn update_task_status(
    State(state): State<AppState>,
    Json(request): Json<UpdateTaskStatusRequest>,
) -> ApiResult<StatusCode> {
    match request.status.as_str() {
        "running" => {
            if !state.tasks.mark_running(request.task_id, Some(&request.device_id)).await? {
                return Err(ApiError::Conflict("task is not in an assignable state for this device".into()));
            }
            state.assignments.mark_running(request.task_id, &request.device_id).await?;
            Ok(StatusCode::OK)
        }
        "done" => {
            state.tasks.mark_done(request.task_id, request.result_data.clone()).await?;
            state
                .assignments
                .complete(request.task_id, &request.device_id, AssignmentStatus::Completed, None, request.result_data)
                .await?;
            state.devices.dec_counter(&request.device_id).await?;
            Ok(StatusCode::OK)
        }
        "failed" => {
            let task = state
                .tasks
                .get(request.task_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(request.task_id.to_string()))?;

            let delay = if task.retry_budget_exhausted() {
                std::time::Duration::from_secs(0)
            } else {
                retry_backoff(task.retry)
            };
            state.tasks.fail(request.task_id, request.error_message.as_deref(), delay).await?;
            state
                .assignments
                .complete(
                    request.task_id,
                    &request.device_id,
                    AssignmentStatus::Failed,
                    request.error_message.as_deref(),
                    None,
                )
                .await?;
            state.devices.dec_counter(&request.device_id).await?;
            Ok(StatusCode::OK)
        }
        other => Err(ApiError::Validation(format!("invalid status report: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct PullTasksQuery {
    pub limit: Option<u32>,
}

pub async fn pull_tasks(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<PullTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let limit = query.limit.unwrap_or(MAX_PULL_LIMIT).min(MAX_PULL_LIMIT) as usize;
    let mut tasks = state.tasks.list_assigned_by_device(&device_id).await?;
    tasks.truncate(limit);
    Ok(Json(tasks))
}
