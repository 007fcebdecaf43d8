// [libs/infra/store/src/repositories/assignment_repository.rs]
/*!
 * =================================================================
 * APARATO: ASSIGNMENT LEDGER REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO APPEND-ONLY DE COLOCACIONES TAREA-DISPOSITIVO
 *
 * Backs C6 (§3.3). `(task_id, device_id)` is UNIQUE — `upsert_placement`
 * reuses the row on re-dispatch instead of inserting a duplicate, which is
 * what makes the Place protocol idempotent (§8 property 6).
 * =================================================================
 */

use distflow_domain_models::assignment::{Assignment, AssignmentStatus};
use libsql::params;
use tracing::instrument;

use crate::errors::StoreError;
use crate::time::{now_rfc3339, parse_timestamp};
use crate::StoreClient;

pub struct AssignmentRepository {
    store: StoreClient,
}

impl AssignmentRepository {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Inserts a fresh `assigned` row for `(task_id, device_id)`, or — if
    /// one already exists from a prior attempt — reopens it in place
    /// (§4.4 Place protocol step 2).
    #[instrument(skip(self))]
    pub async fn upsert_placement(&self, task_id: i64, device_id: &str) -> Result<i64, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        conn.execute(
            r#"
            INSERT INTO assignments (task_id, device_id, status, retry_count, assigned_at)
            VALUES (?1, ?2, 'assigned', 0, ?3)
            ON CONFLICT(task_id, device_id) DO UPDATE SET
                status = 'assigned',
                retry_count = assignments.retry_count + 1,
                assigned_at = excluded.assigned_at,
                started_at = NULL,
                completed_at = NULL,
                error_message = NULL,
                result_data_json = NULL
            "#,
            params![task_id, device_id, now],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT id FROM assignments WHERE task_id = ?1 AND device_id = ?2",
                params![task_id, device_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Err(StoreError::MappingError("assignment row vanished after upsert".into())),
        }
    }

    #[instrument(skip(self))]
    pub async fn mark_running(&self, task_id: i64, device_id: &str) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "UPDATE assignments SET status = 'running', started_at = ?3 WHERE task_id = ?1 AND device_id = ?2",
            params![task_id, device_id, now_rfc3339()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, result_data))]
    pub async fn complete(
        &self,
        task_id: i64,
        device_id: &str,
        status: AssignmentStatus,
        error_message: Option<&str>,
        result_data: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let result_json = result_data
            .map(|r| serde_json::to_string(&r))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?;

        conn.execute(
            r#"
            UPDATE assignments
            SET status = ?3, completed_at = ?4, error_message = ?5, result_data_json = ?6
            WHERE task_id = ?1 AND device_id = ?2 AND status IN ('assigned', 'running')
            "#,
            params![
                task_id,
                device_id,
                status.as_str(),
                now_rfc3339(),
                error_message,
                result_json
            ],
        )
        .await?;
        Ok(())
    }

    /// Closes the currently-open assignment for a (task, device) pair with
    /// an explanatory reason, without touching the task row itself —
    /// used by the rebalancer (§4.6) and the reaper (§4.5).
    #[instrument(skip(self))]
    pub async fn close_with_reason(
        &self,
        task_id: i64,
        device_id: &str,
        status: AssignmentStatus,
        reason: &str,
    ) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            r#"
            UPDATE assignments
            SET status = ?3, completed_at = ?4, error_message = ?5
            WHERE task_id = ?1 AND device_id = ?2 AND status IN ('assigned', 'running')
            "#,
            params![task_id, device_id, status.as_str(), now_rfc3339(), reason],
        )
        .await?;
        Ok(())
    }

    /// Bulk variant of `close_with_reason` for every open assignment a
    /// device holds at once — used by the heartbeat sweeper (§4.2) when a
    /// device goes offline and all of its open work is released in one step.
    #[instrument(skip(self))]
    pub async fn close_all_open_for_device(
        &self,
        device_id: &str,
        status: AssignmentStatus,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let changed = conn
            .execute(
                r#"
                UPDATE assignments
                SET status = ?2, completed_at = ?3, error_message = ?4
                WHERE device_id = ?1 AND status IN ('assigned', 'running')
                "#,
                params![device_id, status.as_str(), now_rfc3339(), reason],
            )
            .await?;
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub async fn list_for_task(&self, task_id: i64) -> Result<Vec<Assignment>, StoreError> {
        let conn = self.store.connection()?;
        let sql = "SELECT id, task_id, device_id, status, retry_count, assigned_at, started_at,
                           completed_at, error_message, result_data_json
                    FROM assignments WHERE task_id = ?1 ORDER BY id ASC";
        let mut rows = conn.query(sql, params![task_id]).await?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next().await? {
            assignments.push(row_to_assignment(&row)?);
        }
        Ok(assignments)
    }

    #[instrument(skip(self))]
    pub async fn count_open_for_device(&self, device_id: &str) -> Result<i64, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM assignments WHERE device_id = ?1 AND status IN ('assigned', 'running')",
                params![device_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// §6.1 cleanup: deletes closed assignments older than `older_than_days`.
    #[instrument(skip(self))]
    pub async fn delete_closed_older_than(&self, older_than_days: i64) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(older_than_days)).to_rfc3339();
        let deleted = conn
            .execute(
                r#"
                DELETE FROM assignments
                WHERE status IN ('completed', 'failed', 'timeout') AND assigned_at < ?1
                "#,
                params![cutoff],
            )
            .await?;
        Ok(deleted)
    }
}

fn row_to_assignment(row: &libsql::Row) -> Result<Assignment, StoreError> {
    let id: i64 = row.get(0)?;
    let task_id: i64 = row.get(1)?;
    let device_id: String = row.get(2)?;
    let status_raw: String = row.get(3)?;
    let retry_count: i64 = row.get(4)?;
    let assigned_at: String = row.get(5)?;
    let started_at: Option<String> = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;
    let error_message: Option<String> = row.get(8)?;
    let result_data_json: Option<String> = row.get(9)?;

    let status = status_raw.parse::<AssignmentStatus>().map_err(StoreError::MappingError)?;
    let result_data = result_data_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::MappingError(e.to_string()))?;

    Ok(Assignment {
        id,
        task_id,
        device_id,
        status,
        retry_count: retry_count as u32,
        assigned_at: parse_timestamp(&assigned_at).unwrap_or_else(chrono::Utc::now),
        started_at: started_at.and_then(|s| parse_timestamp(&s)),
        completed_at: completed_at.and_then(|s| parse_timestamp(&s)),
        error_message,
        result_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> AssignmentRepository {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        AssignmentRepository::new(store)
    }

    #[tokio::test]
    async fn upsert_placement_reopens_instead_of_duplicating() {
        let repo = repo().await;
        let first_id = repo.upsert_placement(1, "device-a").await.unwrap();
        let second_id = repo.upsert_placement(1, "device-a").await.unwrap();

        // §8 property 6: re-placing the same (task, device) pair reuses the
        // row instead of creating a second open assignment.
        assert_eq!(first_id, second_id);
        let all = repo.list_for_task(1).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].retry_count, 1);
    }

    #[tokio::test]
    async fn close_with_reason_only_touches_open_rows() {
        let repo = repo().await;
        repo.upsert_placement(1, "device-a").await.unwrap();
        repo.close_with_reason(1, "device-a", AssignmentStatus::Timeout, "execution timeout")
            .await
            .unwrap();

        let assignment = &repo.list_for_task(1).await.unwrap()[0];
        assert_eq!(assignment.status, AssignmentStatus::Timeout);
        assert!(assignment.completed_at.is_some());

        // Closing an already-closed row is a no-op, not an error.
        repo.close_with_reason(1, "device-a", AssignmentStatus::Completed, "late retry")
            .await
            .unwrap();
        let assignment = &repo.list_for_task(1).await.unwrap()[0];
        assert_eq!(assignment.status, AssignmentStatus::Timeout);
    }

    #[tokio::test]
    async fn count_open_for_device_tracks_assigned_and_running_only() {
        let repo = repo().await;
        repo.upsert_placement(1, "device-a").await.unwrap();
        repo.upsert_placement(2, "device-a").await.unwrap();
        assert_eq!(repo.count_open_for_device("device-a").await.unwrap(), 2);

        repo.complete(1, "device-a", AssignmentStatus::Completed, None, None).await.unwrap();
        assert_eq!(repo.count_open_for_device("device-a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn close_all_open_for_device_releases_everything_at_once() {
        let repo = repo().await;
        repo.upsert_placement(1, "device-a").await.unwrap();
        repo.upsert_placement(2, "device-a").await.unwrap();

        let closed = repo
            .close_all_open_for_device("device-a", AssignmentStatus::Failed, "device went offline")
            .await
            .unwrap();
        assert_eq!(closed, 2);
        assert_eq!(repo.count_open_for_device("device-a").await.unwrap(), 0);
    }
}
