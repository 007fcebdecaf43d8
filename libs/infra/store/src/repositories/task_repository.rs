// [libs/infra/store/src/repositories/task_repository.rs]
/*!
 * =================================================================
 * APARATO: TASK QUEUE REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: COLA DURABLE DE TAREAS Y SU MÁQUINA DE ESTADOS
 *
 * Backs C4 (§4.3). `assign` is the sole compare-and-set serialization
 * point for placement (§5) — it is a single `UPDATE ... WHERE status =
 * 'pending'` and the caller trusts its row count, nothing else in this
 * crate may move a task out of `pending`.
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use distflow_domain_models::task::{Task, TaskStatus};
use libsql::params;
use tracing::{debug, instrument, warn};

use crate::errors::StoreError;
use crate::time::{now_rfc3339, parse_timestamp};
use crate::StoreClient;

pub struct TaskRepository {
    store: StoreClient,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub execution_timeout: i64,
    pub max_retry_count: u32,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl TaskRepository {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Bulk insert, initial `status = pending` (§4.3 Add).
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub async fn add(&self, tasks: Vec<NewTask>) -> Result<Vec<i64>, StoreError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.store.connection()?;
        let txn = conn.transaction().await?;
        let now = now_rfc3339();
        let mut ids = Vec::with_capacity(tasks.len());

        for task in &tasks {
            let payload_json = serde_json::to_string(&task.payload)
                .map_err(|e| StoreError::MappingError(e.to_string()))?;
            let next_run_at = task
                .next_run_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| now.clone());

            txn.execute(
                r#"
                INSERT INTO tasks (
                    task_type, payload_json, priority, status, retry,
                    max_retry_count, execution_timeout, next_run_at,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6, ?7, ?7)
                "#,
                params![
                    task.task_type.clone(),
                    payload_json,
                    task.priority,
                    task.max_retry_count,
                    task.execution_timeout,
                    next_run_at,
                    now.clone()
                ],
            )
            .await?;
            ids.push(txn.last_insert_rowid());
        }

        txn.commit().await?;
        debug!(count = ids.len(), "tasks enqueued");
        Ok(ids)
    }

    /// §4.3 FetchAssignable: pending, due, retry budget remaining, ordered
    /// `priority DESC, next_run_at ASC, id ASC`.
    #[instrument(skip(self))]
    pub async fn fetch_assignable(
        &self,
        task_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Task>, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let sql = "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                           execution_timeout, next_run_at, assigned_device_id, assigned_at,
                           result_json, error_message, created_at, updated_at
                    FROM tasks
                    WHERE status = 'pending'
                      AND next_run_at <= ?1
                      AND retry < max_retry_count
                      AND (?2 IS NULL OR task_type = ?2)
                    ORDER BY priority DESC, next_run_at ASC, id ASC
                    LIMIT ?3";

        let mut rows = conn.query(sql, params![now, task_type, limit]).await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// §4.3/§4.4 Assign: atomic CAS `pending -> assigned`. Returns `true`
    /// iff exactly one row changed — the single linearization point for
    /// placement (§5, §8 property 1).
    #[instrument(skip(self))]
    pub async fn assign(&self, task_id: i64, device_id: &str) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'assigned', assigned_device_id = ?2, assigned_at = ?3, updated_at = ?3
                WHERE id = ?1 AND status = 'pending'
                "#,
                params![task_id, device_id, now],
            )
            .await?;

        Ok(changed == 1)
    }

    #[instrument(skip(self))]
    pub async fn mark_running(&self, task_id: i64, device_id: Option<&str>) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'running', updated_at = ?3
                WHERE id = ?1 AND status = 'assigned' AND (?2 IS NULL OR assigned_device_id = ?2)
                "#,
                params![task_id, device_id, now],
            )
            .await?;
        Ok(changed == 1)
    }

    #[instrument(skip(self, result))]
    pub async fn mark_done(&self, task_id: i64, result: Option<serde_json::Value>) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let result_json = result
            .map(|r| serde_json::to_string(&r))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?;

        let changed = conn
            .execute(
                "UPDATE tasks SET status = 'done', result_json = ?2, updated_at = ?3 WHERE id = ?1",
                params![task_id, result_json, now],
            )
            .await?;
        Ok(changed == 1)
    }

    #[instrument(skip(self, ids))]
    pub async fn mark_done_batch(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.store.connection()?;
        let txn = conn.transaction().await?;
        let now = now_rfc3339();
        let mut total = 0u64;

        for id in ids {
            total += txn
                .execute(
                    "UPDATE tasks SET status = 'done', updated_at = ?2 WHERE id = ?1",
                    params![*id, now.clone()],
                )
                .await?;
        }
        txn.commit().await?;
        Ok(total)
    }

    /// §4.3 Fail: `status=failed`, `retry += 1`, `next_run_at = now +
    /// retry_delay`. A future `FetchAssignable` pass can resurrect it once
    /// `next_run_at` elapses, provided retry budget remains.
    #[instrument(skip(self))]
    pub async fn fail(
        &self,
        task_id: i64,
        error_message: Option<&str>,
        retry_delay: Duration,
    ) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = Utc::now();
        let next_run_at = (now + retry_delay).to_rfc3339();

        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'failed',
                    retry = retry + 1,
                    next_run_at = ?2,
                    error_message = ?3,
                    assigned_device_id = NULL,
                    assigned_at = NULL,
                    updated_at = ?4
                WHERE id = ?1
                "#,
                params![task_id, next_run_at, error_message, now.to_rfc3339()],
            )
            .await?;
        Ok(changed == 1)
    }

    /// §4.3's `Reset()`: a periodic scan (run once per dispatch tick ahead
    /// of `fetch_assignable`) that flips due, retryable `failed` rows back
    /// to `pending` — the `failed --backoff--> pending` edge of the state
    /// diagram. A `failed` row with `retry >= max_retry_count` is left
    /// alone; it is terminal (§3.2 invariants).
    #[instrument(skip(self))]
    pub async fn reset_due_failures(&self) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'pending', updated_at = ?1
                WHERE status = 'failed' AND next_run_at <= ?1 AND retry < max_retry_count
                "#,
                params![now],
            )
            .await?;
        if changed > 0 {
            debug!(count = changed, "resurrected due failed tasks to pending");
        }
        Ok(changed)
    }

    /// §4.3 ReleaseDeviceTasks: bulk move a device's open tasks back to
    /// pending, clearing assignment fields. Returns the count released.
    #[instrument(skip(self))]
    pub async fn release_device_tasks(&self, device_id: &str) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'pending', assigned_device_id = NULL, assigned_at = NULL, updated_at = ?2
                WHERE assigned_device_id = ?1 AND status IN ('assigned', 'running')
                "#,
                params![device_id, now],
            )
            .await?;

        if changed > 0 {
            debug!(device_id, released = changed, "released device's open tasks");
        }
        Ok(changed)
    }

    /// Rolls back a single task placement — used when the Place protocol's
    /// assignment-row step fails after the CAS already succeeded (§4.4 step 3).
    #[instrument(skip(self))]
    pub async fn release_single_task(&self, task_id: i64) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'pending', assigned_device_id = NULL, assigned_at = NULL, updated_at = ?2
                WHERE id = ?1 AND status = 'assigned'
                "#,
                params![task_id, now],
            )
            .await?;
        Ok(changed == 1)
    }

    #[instrument(skip(self))]
    pub async fn list_by_device(&self, device_id: &str) -> Result<Vec<Task>, StoreError> {
        let conn = self.store.connection()?;
        let sql = "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                           execution_timeout, next_run_at, assigned_device_id, assigned_at,
                           result_json, error_message, created_at, updated_at
                    FROM tasks
                    WHERE assigned_device_id = ?1 AND status IN ('assigned', 'running')
                    ORDER BY priority DESC, id ASC";

        let mut rows = conn.query(sql, params![device_id]).await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// §6.1 `GET /tasks/{device_id}/pull`: strictly `status = 'assigned'`,
    /// unlike [`Self::list_by_device`] which also includes `running`. A
    /// worker pulling with spare permits must never be handed a task it is
    /// already executing.
    #[instrument(skip(self))]
    pub async fn list_assigned_by_device(&self, device_id: &str) -> Result<Vec<Task>, StoreError> {
        let conn = self.store.connection()?;
        let sql = "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                           execution_timeout, next_run_at, assigned_device_id, assigned_at,
                           result_json, error_message, created_at, updated_at
                    FROM tasks
                    WHERE assigned_device_id = ?1 AND status = 'assigned'
                    ORDER BY priority DESC, id ASC";

        let mut rows = conn.query(sql, params![device_id]).await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// §4.3 ListTimedOut: open tasks whose `assigned_at` predates `age`.
    #[instrument(skip(self))]
    pub async fn list_timed_out(&self, age: Duration) -> Result<Vec<Task>, StoreError> {
        let conn = self.store.connection()?;
        let cutoff = (Utc::now() - age).to_rfc3339();

        let sql = "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                           execution_timeout, next_run_at, assigned_device_id, assigned_at,
                           result_json, error_message, created_at, updated_at
                    FROM tasks
                    WHERE status IN ('assigned', 'running') AND assigned_at IS NOT NULL AND assigned_at < ?1";

        let mut rows = conn.query(sql, params![cutoff]).await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        if !tasks.is_empty() {
            warn!(count = tasks.len(), "timed-out assignments detected");
        }
        Ok(tasks)
    }

    /// §4.3 ZeroPending: bulk `pending -> zero`, the daily carry-over purge.
    /// Touches only `pending` — §9's open question resolution.
    #[instrument(skip(self))]
    pub async fn zero_pending(&self) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let changed = conn
            .execute(
                "UPDATE tasks SET status = 'zero', updated_at = ?1 WHERE status = 'pending'",
                params![now],
            )
            .await?;
        debug!(count = changed, "zeroed stale pending tasks");
        Ok(changed)
    }

    /// Admin-only path (§9): `failed -> pending`, clears retry count. Not
    /// wired to any timer — distinct from `ZeroPending`.
    #[instrument(skip(self))]
    pub async fn reset_failed(&self) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let changed = conn
            .execute(
                r#"
                UPDATE tasks
                SET status = 'pending', retry = 0, next_run_at = ?1, updated_at = ?1
                WHERE status = 'failed'
                "#,
                params![now],
            )
            .await?;
        Ok(changed)
    }

    /// §4.3 ShouldCreateNewTasks: true iff nothing is assignable right now
    /// and the most recent `updated_at` predates `interval_hours`.
    #[instrument(skip(self))]
    pub async fn should_create_new_tasks(&self, interval_hours: i64) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let mut assignable_rows = conn
            .query(
                "SELECT COUNT(*) FROM tasks WHERE status = 'pending' AND next_run_at <= ?1 AND retry < max_retry_count",
                params![now.clone()],
            )
            .await?;
        let assignable_count: i64 = match assignable_rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        if assignable_count > 0 {
            return Ok(false);
        }

        let mut latest_rows = conn.query("SELECT MAX(updated_at) FROM tasks", ()).await?;
        let latest: Option<String> = match latest_rows.next().await? {
            Some(row) => row.get(0)?,
            None => None,
        };

        let Some(latest) = latest.and_then(|s| parse_timestamp(&s)) else {
            return Ok(true);
        };
        Ok(Utc::now() - latest >= Duration::hours(interval_hours))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, task_id: i64) -> Result<Option<Task>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                        execution_timeout, next_run_at, assigned_device_id, assigned_at,
                        result_json, error_message, created_at, updated_at
                 FROM tasks WHERE id = ?1",
                params![task_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        status: Option<TaskStatus>,
        task_type: Option<&str>,
        device_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Task>, StoreError> {
        let conn = self.store.connection()?;
        let sql = "SELECT id, task_type, payload_json, priority, status, retry, max_retry_count,
                           execution_timeout, next_run_at, assigned_device_id, assigned_at,
                           result_json, error_message, created_at, updated_at
                    FROM tasks
                    WHERE (?1 IS NULL OR status = ?1)
                      AND (?2 IS NULL OR task_type = ?2)
                      AND (?3 IS NULL OR assigned_device_id = ?3)
                    ORDER BY id DESC
                    LIMIT ?4";

        let mut rows = conn
            .query(sql, params![status.map(|s| s.as_str()), task_type, device_id, limit])
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn count_by_status(&self) -> Result<distflow_domain_models::api::TaskCounts, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query("SELECT status, COUNT(*) FROM tasks GROUP BY status", ())
            .await?;

        let mut counts = distflow_domain_models::api::TaskCounts::default();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            match status.as_str() {
                "pending" => counts.pending = count,
                "assigned" => counts.assigned = count,
                "running" => counts.running = count,
                "done" => counts.done = count,
                "failed" => counts.failed = count,
                "zero" => counts.zero = count,
                _ => {}
            }
        }
        Ok(counts)
    }
}

fn row_to_task(row: &libsql::Row) -> Result<Task, StoreError> {
    let id: i64 = row.get(0)?;
    let task_type: String = row.get(1)?;
    let payload_json: String = row.get(2)?;
    let priority: i64 = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let retry: i64 = row.get(5)?;
    let max_retry_count: i64 = row.get(6)?;
    let execution_timeout: i64 = row.get(7)?;
    let next_run_at: String = row.get(8)?;
    let assigned_device_id: Option<String> = row.get(9)?;
    let assigned_at: Option<String> = row.get(10)?;
    let result_json: Option<String> = row.get(11)?;
    let error_message: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    let status = status_raw.parse::<TaskStatus>().map_err(StoreError::MappingError)?;
    let payload: serde_json::Value =
        serde_json::from_str(&payload_json).map_err(|e| StoreError::MappingError(e.to_string()))?;
    let result = result_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::MappingError(e.to_string()))?;

    Ok(Task {
        id,
        task_type,
        payload,
        priority: priority as i32,
        status,
        retry: retry as u32,
        max_retry_count: max_retry_count as u32,
        execution_timeout,
        next_run_at: parse_timestamp(&next_run_at).unwrap_or_else(Utc::now),
        assigned_device_id,
        assigned_at: assigned_at.and_then(|s| parse_timestamp(&s)),
        result,
        error_message,
        created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> TaskRepository {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        TaskRepository::new(store)
    }

    fn one_task() -> NewTask {
        NewTask {
            task_type: "scrape".into(),
            payload: serde_json::json!({"url": "https://example.com"}),
            priority: 0,
            execution_timeout: 0,
            max_retry_count: 3,
            next_run_at: None,
        }
    }

    #[tokio::test]
    async fn assign_is_a_single_use_cas() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task()]).await.unwrap();
        let task_id = ids[0];

        assert!(repo.assign(task_id, "device-a").await.unwrap());
        // §8 property 1: a second CAS attempt on the same task must fail,
        // even against a different device, once it has left `pending`.
        assert!(!repo.assign(task_id, "device-b").await.unwrap());

        let task = repo.get(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_device_id.as_deref(), Some("device-a"));
    }

    #[tokio::test]
    async fn fetch_assignable_excludes_assigned_and_exhausted_retries() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task(), one_task()]).await.unwrap();
        repo.assign(ids[0], "device-a").await.unwrap();

        let assignable = repo.fetch_assignable(None, 10).await.unwrap();
        assert_eq!(assignable.len(), 1);
        assert_eq!(assignable[0].id, ids[1]);

        // Exhaust the retry budget on the still-pending task directly.
        for _ in 0..3 {
            repo.fail(ids[1], Some("boom"), Duration::zero()).await.unwrap();
            repo.reset_due_failures().await.unwrap();
        }
        let assignable = repo.fetch_assignable(None, 10).await.unwrap();
        assert!(assignable.is_empty(), "a task past its retry budget must not be assignable");
    }

    #[tokio::test]
    async fn fail_applies_backoff_and_respects_retry_budget() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task()]).await.unwrap();
        let task_id = ids[0];
        repo.assign(task_id, "device-a").await.unwrap();

        repo.fail(task_id, Some("network error"), Duration::seconds(60)).await.unwrap();
        let task = repo.get(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry, 1);
        assert!(task.next_run_at > Utc::now());
    }

    #[tokio::test]
    async fn release_device_tasks_requeues_open_work() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task(), one_task()]).await.unwrap();
        repo.assign(ids[0], "device-a").await.unwrap();
        repo.assign(ids[1], "device-a").await.unwrap();
        repo.mark_running(ids[0], Some("device-a")).await.unwrap();

        let released = repo.release_device_tasks("device-a").await.unwrap();
        assert_eq!(released, 2);

        for id in ids {
            let task = repo.get(id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Pending);
            assert!(task.assigned_device_id.is_none());
        }
    }

    #[tokio::test]
    async fn zero_pending_only_touches_pending_rows() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task(), one_task()]).await.unwrap();
        repo.assign(ids[0], "device-a").await.unwrap();

        let zeroed = repo.zero_pending().await.unwrap();
        assert_eq!(zeroed, 1);

        assert_eq!(repo.get(ids[0]).await.unwrap().unwrap().status, TaskStatus::Assigned);
        assert_eq!(repo.get(ids[1]).await.unwrap().unwrap().status, TaskStatus::Zero);
    }

    #[tokio::test]
    async fn reset_failed_clears_retry_and_reopens_terminal_failures() {
        let repo = repo().await;
        let ids = repo.add(vec![one_task()]).await.unwrap();
        let task_id = ids[0];
        repo.assign(task_id, "device-a").await.unwrap();
        for _ in 0..3 {
            repo.fail(task_id, Some("boom"), Duration::zero()).await.unwrap();
        }

        let reset = repo.reset_failed().await.unwrap();
        assert_eq!(reset, 1);
        let task = repo.get(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry, 0);
    }
}
