// [apps/worker/src/state.rs]
//! Composition root for the worker process. Everything the heartbeat
//! sender, task puller and executor pool share lives here: the uplink
//! client, the configured limits, the executor registry, and the single
//! semaphore that bounds in-flight work to `concurrent_tasks` (§4.7, §5).

use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::Arc;

use distflow_infra_worker_client::WorkerClient;
use tokio::sync::Semaphore;

use crate::config::WorkerConfig;
use crate::executor::ExecutorRegistry;

#[derive(Clone)]
pub struct WorkerState {
    pub client: Arc<WorkerClient>,
    pub config: Arc<WorkerConfig>,
    pub executors: Arc<ExecutorRegistry>,
    pub device_id: Arc<String>,
    /// One permit per free execution slot; the task puller only asks the
    /// controller for as many tasks as it can acquire permits for.
    pub slots: Arc<Semaphore>,
    /// Heartbeat sender's consecutive-failure counter (§4.7); reset to 0
    /// on the next successful send.
    pub heartbeat_errors: Arc<AtomicU32>,
    /// Local-only view of liveness: flips true after
    /// `max_consecutive_heartbeat_errors` sends fail in a row. The sender
    /// keeps retrying regardless — this only affects what gets logged and
    /// reported as `network_status` on the next heartbeat.
    pub disconnected: Arc<AtomicBool>,
}

impl WorkerState {
    pub fn new(
        client: WorkerClient,
        config: WorkerConfig,
        executors: ExecutorRegistry,
        device_id: String,
    ) -> Self {
        let slots = Semaphore::new(config.concurrent_tasks.max(1) as usize);
        Self {
            client: Arc::new(client),
            config: Arc::new(config),
            executors: Arc::new(executors),
            device_id: Arc::new(device_id),
            slots: Arc::new(slots),
            heartbeat_errors: Arc::new(AtomicU32::new(0)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.config.concurrent_tasks.saturating_sub(self.slots.available_permits() as u32)
    }
}
