// [apps/controller/src/kernel.rs]
//! Composition root. Opens the store, wires `AppState`, then spawns the
//! three background daemons (dispatcher, reaper, heartbeat sweeper) before
//! handing control to axum — mirroring the ignite-then-launch split used
//! elsewhere in this workspace's process entry points.

use std::net::{IpAddr, SocketAddr};

use distflow_infra_store::StoreClient;
use tracing::{error, info, instrument};

use crate::config::ControllerConfig;
use crate::routes::build_router;
use crate::services::{spawn_daily_reset, spawn_dispatcher, spawn_heartbeat_sweeper, spawn_reaper};
use crate::state::AppState;

pub struct ControllerKernel {
    port: u16,
    state: AppState,
}

impl ControllerKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: ControllerConfig) -> anyhow::Result<Self> {
        let store = StoreClient::connect(&config.database_url, config.database_token.clone()).await?;
        let port = config.master_port;
        let state = AppState::new(store, config);
        Ok(Self { port, state })
    }

    pub async fn launch(self) -> anyhow::Result<()> {
        spawn_dispatcher(self.state.clone());
        spawn_reaper(self.state.clone());
        spawn_heartbeat_sweeper(self.state.clone());
        spawn_daily_reset(self.state.clone());

        let router = build_router(self.state);
        let bind_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.port);

        info!(%bind_address, "controller: listening");
        let listener = tokio::net::TcpListener::bind(bind_address).await?;

        if let Err(error) = axum::serve(listener, router).await {
            error!(%error, "controller: server exited");
            return Err(error.into());
        }
        Ok(())
    }
}
