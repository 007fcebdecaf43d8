// [apps/controller/src/main.rs]
use distflow_controller::prelude::*;
use distflow_shared_telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControllerConfig::load();
    init_tracing("distflow_controller");

    let kernel = ControllerKernel::ignite(config).await?;
    kernel.launch().await
}
