// [libs/infra/store/src/schema.rs]
//! Idempotent schema bootstrap for the four logical tables of §6.2:
//! devices, tasks, assignments, heartbeats — plus their required indexes.

use libsql::Connection;
use tracing::{debug, info, instrument};

use crate::errors::StoreError;

const TABLES: &[(&str, &str)] = &[
    ("devices", r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id TEXT PRIMARY KEY,
            device_name TEXT NOT NULL,
            device_type TEXT NOT NULL,
            address TEXT,
            capabilities_json TEXT NOT NULL DEFAULT '{}',
            max_concurrent_tasks INTEGER NOT NULL DEFAULT 1,
            current_tasks INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'online',
            last_heartbeat TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("tasks", r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_type TEXT NOT NULL,
            payload_json TEXT NOT NULL DEFAULT '{}',
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            retry INTEGER NOT NULL DEFAULT 0,
            max_retry_count INTEGER NOT NULL DEFAULT 3,
            execution_timeout INTEGER NOT NULL DEFAULT 3600,
            next_run_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            assigned_device_id TEXT,
            assigned_at TEXT,
            result_json TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("assignments", r#"
        CREATE TABLE IF NOT EXISTS assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            device_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'assigned',
            retry_count INTEGER NOT NULL DEFAULT 0,
            assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            started_at TEXT,
            completed_at TEXT,
            error_message TEXT,
            result_data_json TEXT,
            UNIQUE(task_id, device_id)
        );
    "#),
    ("heartbeats", r#"
        CREATE TABLE IF NOT EXISTS heartbeats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL,
            t TEXT NOT NULL,
            cpu_usage REAL,
            memory_usage REAL,
            disk_usage REAL,
            network_status TEXT NOT NULL DEFAULT 'unknown',
            running_tasks INTEGER NOT NULL DEFAULT 0,
            system_load REAL,
            error_count INTEGER NOT NULL DEFAULT 0,
            status_info TEXT
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_devices_status", "CREATE INDEX IF NOT EXISTS idx_devices_status ON devices(status);"),
    ("idx_devices_last_heartbeat", "CREATE INDEX IF NOT EXISTS idx_devices_last_heartbeat ON devices(last_heartbeat);"),
    ("idx_tasks_status_next", "CREATE INDEX IF NOT EXISTS idx_tasks_status_next ON tasks(status, next_run_at);"),
    ("idx_tasks_type", "CREATE INDEX IF NOT EXISTS idx_tasks_type ON tasks(task_type);"),
    ("idx_tasks_priority", "CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks(priority);"),
    ("idx_tasks_assigned", "CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks(assigned_device_id, status);"),
    ("idx_assignments_device_status", "CREATE INDEX IF NOT EXISTS idx_assignments_device_status ON assignments(device_id, status);"),
    ("idx_assignments_assigned_at", "CREATE INDEX IF NOT EXISTS idx_assignments_assigned_at ON assignments(assigned_at);"),
    ("idx_heartbeats_device_t", "CREATE INDEX IF NOT EXISTS idx_heartbeats_device_t ON heartbeats(device_id, t);"),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    info!("store: applying schema");

    for (name, ddl) in TABLES {
        conn.execute(ddl, ()).await.map_err(|e| {
            StoreError::ConnectionError(format!("failed to create table {name}: {e}"))
        })?;
        debug!(table = name, "store: table ready");
    }

    for (name, ddl) in INDEXES {
        conn.execute(ddl, ()).await.map_err(|e| {
            StoreError::ConnectionError(format!("failed to create index {name}: {e}"))
        })?;
    }

    Ok(())
}
