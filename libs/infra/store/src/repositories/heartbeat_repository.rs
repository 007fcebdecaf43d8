// [libs/infra/store/src/repositories/heartbeat_repository.rs]
/*!
 * =================================================================
 * APARATO: HEARTBEAT TIME-SERIES REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: MUESTREO DE CARGA POR DISPOSITIVO Y SU RETENCIÓN
 *
 * Backs §3.4. Insert-only from the collector's point of view; retention
 * is swept separately (§6.1 cleanup), never inline with the insert path,
 * so a slow sweep never blocks heartbeat ingestion.
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use distflow_domain_models::heartbeat::HeartbeatSample;
use libsql::params;
use tracing::instrument;

use crate::errors::StoreError;
use crate::time::{now_rfc3339, parse_timestamp};
use crate::StoreClient;

const DEFAULT_RETENTION_DAYS: i64 = 7;

pub struct HeartbeatRepository {
    store: StoreClient,
}

impl HeartbeatRepository {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    #[instrument(skip(self, sample))]
    pub async fn record(&self, sample: &HeartbeatSample) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            r#"
            INSERT INTO heartbeats (
                device_id, t, cpu_usage, memory_usage, disk_usage,
                network_status, running_tasks, system_load, error_count, status_info
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                sample.device_id.as_str(),
                now_rfc3339(),
                sample.cpu_usage,
                sample.memory_usage,
                sample.disk_usage,
                sample.network_status.as_str(),
                sample.running_tasks,
                sample.system_load,
                sample.error_count,
                sample.status_info.as_deref()
            ],
        )
        .await?;
        Ok(())
    }

    /// Most recent sample for a device, used to derive its placement
    /// weight (§4.4).
    #[instrument(skip(self))]
    pub async fn latest_for_device(&self, device_id: &str) -> Result<Option<HeartbeatSample>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                r#"
                SELECT device_id, t, cpu_usage, memory_usage, disk_usage,
                       network_status, running_tasks, system_load, error_count, status_info
                FROM heartbeats
                WHERE device_id = ?1
                ORDER BY t DESC
                LIMIT 1
                "#,
                params![device_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_sample(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn history_for_device(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<HeartbeatSample>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                r#"
                SELECT device_id, t, cpu_usage, memory_usage, disk_usage,
                       network_status, running_tasks, system_load, error_count, status_info
                FROM heartbeats
                WHERE device_id = ?1
                ORDER BY t DESC
                LIMIT ?2
                "#,
                params![device_id, limit],
            )
            .await?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next().await? {
            samples.push(row_to_sample(&row)?);
        }
        Ok(samples)
    }

    /// §6.1 cleanup: deletes samples older than `retention_days` (default 7).
    #[instrument(skip(self))]
    pub async fn purge_older_than(&self, retention_days: Option<i64>) -> Result<u64, StoreError> {
        let conn = self.store.connection()?;
        let retention = retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        let cutoff = (Utc::now() - Duration::days(retention)).to_rfc3339();
        let deleted = conn
            .execute("DELETE FROM heartbeats WHERE t < ?1", params![cutoff])
            .await?;
        Ok(deleted)
    }
}

fn row_to_sample(row: &libsql::Row) -> Result<HeartbeatSample, StoreError> {
    let device_id: String = row.get(0)?;
    let t: String = row.get(1)?;
    let cpu_usage: Option<f64> = row.get(2)?;
    let memory_usage: Option<f64> = row.get(3)?;
    let disk_usage: Option<f64> = row.get(4)?;
    let network_status: String = row.get(5)?;
    let running_tasks: i64 = row.get(6)?;
    let system_load: Option<f64> = row.get(7)?;
    let error_count: i64 = row.get(8)?;
    let status_info: Option<String> = row.get(9)?;

    let t: DateTime<Utc> = parse_timestamp(&t).unwrap_or_else(Utc::now);

    Ok(HeartbeatSample {
        device_id,
        t,
        cpu_usage,
        memory_usage,
        disk_usage,
        network_status,
        running_tasks: running_tasks as u32,
        system_load,
        error_count: error_count as u32,
        status_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> HeartbeatRepository {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        HeartbeatRepository::new(store)
    }

    fn sample(device_id: &str, cpu: f64) -> HeartbeatSample {
        HeartbeatSample {
            device_id: device_id.to_string(),
            t: Utc::now(),
            cpu_usage: Some(cpu),
            memory_usage: Some(10.0),
            disk_usage: Some(5.0),
            network_status: "ok".into(),
            running_tasks: 1,
            system_load: Some(0.5),
            error_count: 0,
            status_info: None,
        }
    }

    #[tokio::test]
    async fn latest_for_device_returns_the_most_recent_sample() {
        let repo = repo().await;
        repo.record(&sample("dev-1", 10.0)).await.unwrap();
        repo.record(&sample("dev-1", 90.0)).await.unwrap();

        let latest = repo.latest_for_device("dev-1").await.unwrap().unwrap();
        assert_eq!(latest.cpu_usage, Some(90.0));
    }

    #[tokio::test]
    async fn history_for_device_is_scoped_and_bounded() {
        let repo = repo().await;
        for i in 0..5 {
            repo.record(&sample("dev-1", i as f64)).await.unwrap();
        }
        repo.record(&sample("dev-2", 1.0)).await.unwrap();

        let history = repo.history_for_device("dev-1", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|s| s.device_id == "dev-1"));
    }

    #[tokio::test]
    async fn latest_for_device_is_none_when_no_samples_exist() {
        let repo = repo().await;
        assert!(repo.latest_for_device("ghost").await.unwrap().is_none());
    }
}
