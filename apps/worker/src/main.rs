// [apps/worker/src/main.rs]
use std::sync::Arc;

use distflow_worker::prelude::*;
use distflow_shared_telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::load();
    init_tracing("distflow_worker");

    let mut executors = ExecutorRegistry::new();
    for task_type in &config.supported_task_types {
        executors.register(task_type.clone(), Arc::new(EchoExecutor));
    }

    let kernel = WorkerKernel::ignite(config, executors).await?;
    kernel.launch().await
}
