// [apps/worker/src/kernel.rs]
//! Composition root for the worker process: resolve the device id,
//! register with the controller, wire `WorkerState`, then spawn the
//! heartbeat sender and task puller before blocking on a shutdown signal
//! — mirroring the ignite-then-launch split `apps/controller` uses.

use std::collections::HashMap;

use distflow_domain_models::api::RegisterDeviceRequest;
use distflow_domain_models::device::Capabilities;
use distflow_infra_worker_client::WorkerClient;
use tracing::{info, instrument};

use crate::config::WorkerConfig;
use crate::executor::ExecutorRegistry;
use crate::runtime::{spawn_heartbeat_sender, spawn_task_puller};
use crate::state::WorkerState;

pub struct WorkerKernel {
    state: WorkerState,
}

impl WorkerKernel {
    #[instrument(skip(config, executors))]
    pub async fn ignite(config: WorkerConfig, executors: ExecutorRegistry) -> anyhow::Result<Self> {
        let device_id = config.resolved_device_id();
        let device_name = config.resolved_device_name();
        let base_url = config.controller_base_url();

        let client = WorkerClient::new(&base_url, config.api_key.as_deref())?;

        let capabilities = Capabilities {
            supported_task_types: config.supported_task_types.clone(),
            extra: HashMap::new(),
        };

        client
            .register_device(&RegisterDeviceRequest {
                device_id: device_id.clone(),
                device_name,
                device_type: config.device_type.clone(),
                ip_address: None,
                capabilities,
                max_concurrent_tasks: config.concurrent_tasks,
            })
            .await?;

        info!(device_id, base_url, "worker: registered with controller");

        let state = WorkerState::new(client, config, executors, device_id);
        Ok(Self { state })
    }

    pub async fn launch(self) -> anyhow::Result<()> {
        spawn_heartbeat_sender(self.state.clone());
        spawn_task_puller(self.state.clone());

        info!(device_id = %self.state.device_id, "worker: runtime loops started, awaiting shutdown signal");
        tokio::signal::ctrl_c().await?;
        info!(device_id = %self.state.device_id, "worker: shutdown signal received, exiting");
        Ok(())
    }
}
