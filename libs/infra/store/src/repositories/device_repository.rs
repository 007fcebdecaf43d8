// [libs/infra/store/src/repositories/device_repository.rs]
/*!
 * =================================================================
 * APARATO: DEVICE REGISTRY REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL INVENTARIO DE WORKERS Y SU VITALIDAD
 *
 * Backs C2 (§4.1). `inc_counter`/`dec_counter` are the only writers of
 * `current_tasks`; both clamp instead of erroring, and both derive
 * `status` from the resulting load rather than trusting a caller-supplied
 * value, so the online/busy boundary can never drift from the counter.
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use distflow_domain_models::device::{Capabilities, Device, DeviceRole, DeviceStatus};
use libsql::params;
use tracing::{debug, instrument, warn};

use crate::errors::StoreError;
use crate::time::{now_rfc3339, parse_timestamp};
use crate::StoreClient;

/// Window within which a device counts as "recently seen" for `ListAvailable`.
const RECENTLY_SEEN_SECS: i64 = 120;

pub struct DeviceRepository {
    store: StoreClient,
}

impl DeviceRepository {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Upsert keyed by `device_id`. Idempotent; always resets status to
    /// online and refreshes `last_heartbeat` (§4.1 Register).
    #[instrument(skip(self, capabilities))]
    pub async fn register(
        &self,
        device_id: &str,
        device_name: &str,
        device_type: DeviceRole,
        address: Option<&str>,
        capabilities: &Capabilities,
        max_concurrent_tasks: u32,
    ) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();
        let capabilities_json = serde_json::to_string(capabilities)
            .map_err(|e| StoreError::MappingError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO devices (
                device_id, device_name, device_type, address,
                capabilities_json, max_concurrent_tasks, current_tasks,
                status, last_heartbeat, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'online', ?7, ?7, ?7)
            ON CONFLICT(device_id) DO UPDATE SET
                device_name = excluded.device_name,
                device_type = excluded.device_type,
                address = excluded.address,
                capabilities_json = excluded.capabilities_json,
                max_concurrent_tasks = excluded.max_concurrent_tasks,
                status = 'online',
                last_heartbeat = excluded.last_heartbeat,
                updated_at = excluded.updated_at
            "#,
            params![
                device_id,
                device_name,
                device_type.as_str(),
                address,
                capabilities_json,
                max_concurrent_tasks,
                now
            ],
        )
        .await?;

        debug!(device_id, "device registered");
        Ok(())
    }

    /// Refreshes liveness; optionally updates the reported `current_tasks`
    /// and flips offline→online (§4.1).
    #[instrument(skip(self))]
    pub async fn update_heartbeat(
        &self,
        device_id: &str,
        running_tasks: Option<u32>,
    ) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let changed = if let Some(running_tasks) = running_tasks {
            conn.execute(
                r#"
                UPDATE devices
                SET last_heartbeat = ?2,
                    current_tasks = ?3,
                    status = CASE WHEN status = 'offline' THEN 'online' ELSE status END,
                    updated_at = ?2
                WHERE device_id = ?1
                "#,
                params![device_id, now, running_tasks],
            )
            .await?
        } else {
            conn.execute(
                r#"
                UPDATE devices
                SET last_heartbeat = ?2,
                    status = CASE WHEN status = 'offline' THEN 'online' ELSE status END,
                    updated_at = ?2
                WHERE device_id = ?1
                "#,
                params![device_id, now],
            )
            .await?
        };

        if changed == 0 {
            return Err(StoreError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }

    /// Atomic delta, clamped to `[0, max_concurrent_tasks]`; never errors on
    /// saturation, it just stops (§4.1).
    #[instrument(skip(self))]
    pub async fn inc_counter(&self, device_id: &str) -> Result<bool, StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        let changed = conn
            .execute(
                r#"
                UPDATE devices
                SET current_tasks = current_tasks + 1,
                    status = CASE
                        WHEN current_tasks + 1 >= max_concurrent_tasks THEN 'busy'
                        ELSE status
                    END,
                    updated_at = ?2
                WHERE device_id = ?1 AND current_tasks < max_concurrent_tasks
                "#,
                params![device_id, now],
            )
            .await?;

        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    pub async fn dec_counter(&self, device_id: &str) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let now = now_rfc3339();

        conn.execute(
            r#"
            UPDATE devices
            SET current_tasks = MAX(current_tasks - 1, 0),
                status = CASE
                    WHEN current_tasks - 1 < max_concurrent_tasks AND status = 'busy' THEN 'online'
                    ELSE status
                END,
                updated_at = ?2
            WHERE device_id = ?1
            "#,
            params![device_id, now],
        )
        .await?;
        Ok(())
    }

    /// Resets `current_tasks` to zero unconditionally; used by the
    /// heartbeat sweeper after a device is declared offline (§4.2).
    #[instrument(skip(self))]
    pub async fn reset_counter(&self, device_id: &str) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        conn.execute(
            "UPDATE devices SET current_tasks = 0, updated_at = ?2 WHERE device_id = ?1",
            params![device_id, now_rfc3339()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, device_id: &str, status: DeviceStatus) -> Result<(), StoreError> {
        let conn = self.store.connection()?;
        let changed = conn
            .execute(
                "UPDATE devices SET status = ?2, updated_at = ?3 WHERE device_id = ?1",
                params![device_id, status.as_str(), now_rfc3339()],
            )
            .await?;
        if changed == 0 {
            return Err(StoreError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        let conn = self.store.connection()?;
        let mut rows = conn
            .query(
                "SELECT device_id, device_name, device_type, address, capabilities_json,
                        max_concurrent_tasks, current_tasks, status, last_heartbeat, created_at, updated_at
                 FROM devices WHERE device_id = ?1",
                params![device_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_device(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, status: Option<DeviceStatus>) -> Result<Vec<Device>, StoreError> {
        let conn = self.store.connection()?;
        let sql = "SELECT device_id, device_name, device_type, address, capabilities_json,
                           max_concurrent_tasks, current_tasks, status, last_heartbeat, created_at, updated_at
                    FROM devices WHERE (?1 IS NULL OR status = ?1) ORDER BY device_id ASC";
        let mut rows = conn.query(sql, params![status.map(|s| s.as_str())]).await?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(row_to_device(&row)?);
        }
        Ok(devices)
    }

    /// §4.1 ListAvailable: online/busy, spare capacity, seen within 120s,
    /// ordered by least-loaded then most-recently-seen.
    #[instrument(skip(self))]
    pub async fn list_available(&self) -> Result<Vec<Device>, StoreError> {
        let conn = self.store.connection()?;
        let cutoff = (Utc::now() - Duration::seconds(RECENTLY_SEEN_SECS)).to_rfc3339();

        let sql = "SELECT device_id, device_name, device_type, address, capabilities_json,
                           max_concurrent_tasks, current_tasks, status, last_heartbeat, created_at, updated_at
                    FROM devices
                    WHERE status IN ('online', 'busy')
                      AND current_tasks < max_concurrent_tasks
                      AND last_heartbeat IS NOT NULL
                      AND last_heartbeat >= ?1
                    ORDER BY current_tasks ASC, last_heartbeat DESC";

        let mut rows = conn.query(sql, params![cutoff]).await?;
        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(row_to_device(&row)?);
        }
        Ok(devices)
    }

    /// §4.1 ListTimedOut: status still recorded online, but the heartbeat
    /// is older than `threshold` seconds.
    #[instrument(skip(self))]
    pub async fn list_timed_out(&self, threshold_secs: i64) -> Result<Vec<Device>, StoreError> {
        let conn = self.store.connection()?;
        let cutoff = (Utc::now() - Duration::seconds(threshold_secs)).to_rfc3339();

        let sql = "SELECT device_id, device_name, device_type, address, capabilities_json,
                           max_concurrent_tasks, current_tasks, status, last_heartbeat, created_at, updated_at
                    FROM devices
                    WHERE status != 'offline'
                      AND (last_heartbeat IS NULL OR last_heartbeat < ?1)";

        let mut rows = conn.query(sql, params![cutoff]).await?;
        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(row_to_device(&row)?);
        }
        if !devices.is_empty() {
            warn!(count = devices.len(), "devices exceeded heartbeat threshold");
        }
        Ok(devices)
    }
}

fn row_to_device(row: &libsql::Row) -> Result<Device, StoreError> {
    let device_id: String = row.get(0)?;
    let device_name: String = row.get(1)?;
    let device_type_raw: String = row.get(2)?;
    let address: Option<String> = row.get(3)?;
    let capabilities_json: String = row.get(4)?;
    let max_concurrent_tasks: i64 = row.get(5)?;
    let current_tasks: i64 = row.get(6)?;
    let status_raw: String = row.get(7)?;
    let last_heartbeat: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let capabilities: Capabilities = serde_json::from_str(&capabilities_json)
        .map_err(|e| StoreError::MappingError(e.to_string()))?;
    let device_type = device_type_raw
        .parse::<DeviceRole>()
        .map_err(StoreError::MappingError)?;
    let status = status_raw
        .parse::<DeviceStatus>()
        .map_err(StoreError::MappingError)?;
    let last_heartbeat: Option<DateTime<Utc>> = last_heartbeat.and_then(|s| parse_timestamp(&s));

    Ok(Device {
        device_id,
        device_name,
        device_type,
        address,
        capabilities,
        max_concurrent_tasks: max_concurrent_tasks as u32,
        current_tasks: current_tasks as u32,
        status,
        last_heartbeat,
        created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> DeviceRepository {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        DeviceRepository::new(store)
    }

    fn capabilities() -> Capabilities {
        Capabilities {
            supported_task_types: vec!["scrape".into()],
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn register_is_idempotent_and_resets_to_online() {
        let repo = repo().await;
        repo.register("dev-1", "miner-1", DeviceRole::Worker, None, &capabilities(), 4)
            .await
            .unwrap();
        repo.set_status("dev-1", DeviceStatus::Offline).await.unwrap();

        // Re-registering the same id is an upsert, not a duplicate, and
        // always brings the device back online (§4.1 Register).
        repo.register("dev-1", "miner-1-renamed", DeviceRole::Worker, None, &capabilities(), 8)
            .await
            .unwrap();

        let device = repo.get("dev-1").await.unwrap().unwrap();
        assert_eq!(device.device_name, "miner-1-renamed");
        assert_eq!(device.max_concurrent_tasks, 8);
        assert_eq!(device.status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn inc_counter_clamps_at_capacity() {
        let repo = repo().await;
        repo.register("dev-1", "miner-1", DeviceRole::Worker, None, &capabilities(), 2)
            .await
            .unwrap();

        assert!(repo.inc_counter("dev-1").await.unwrap());
        assert!(repo.inc_counter("dev-1").await.unwrap());
        // Capacity is spent; a third increment must not succeed or overshoot.
        assert!(!repo.inc_counter("dev-1").await.unwrap());

        let device = repo.get("dev-1").await.unwrap().unwrap();
        assert_eq!(device.current_tasks, 2);
        assert_eq!(device.status, DeviceStatus::Busy);
    }

    #[tokio::test]
    async fn dec_counter_never_goes_negative() {
        let repo = repo().await;
        repo.register("dev-1", "miner-1", DeviceRole::Worker, None, &capabilities(), 2)
            .await
            .unwrap();

        repo.dec_counter("dev-1").await.unwrap();
        let device = repo.get("dev-1").await.unwrap().unwrap();
        assert_eq!(device.current_tasks, 0);
    }

    #[tokio::test]
    async fn list_available_excludes_full_and_stale_devices() {
        let repo = repo().await;
        repo.register("dev-full", "full", DeviceRole::Worker, None, &capabilities(), 1)
            .await
            .unwrap();
        repo.inc_counter("dev-full").await.unwrap();

        repo.register("dev-spare", "spare", DeviceRole::Worker, None, &capabilities(), 4)
            .await
            .unwrap();

        let available = repo.list_available().await.unwrap();
        let ids: Vec<_> = available.iter().map(|d| d.device_id.as_str()).collect();
        assert!(ids.contains(&"dev-spare"));
        assert!(!ids.contains(&"dev-full"), "a device at capacity must not be listed as available");
    }
}
