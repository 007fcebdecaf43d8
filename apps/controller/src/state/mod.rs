// [apps/controller/src/state/mod.rs]
//! Composition root for the controller. Wires the four store repositories
//! and the parsed config into the single `Clone`-able handle axum hands to
//! every extractor.

use std::sync::Arc;

use distflow_infra_store::{AssignmentRepository, DeviceRepository, HeartbeatRepository, StoreClient, TaskRepository};

use crate::config::ControllerConfig;

#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<DeviceRepository>,
    pub tasks: Arc<TaskRepository>,
    pub assignments: Arc<AssignmentRepository>,
    pub heartbeats: Arc<HeartbeatRepository>,
    pub config: Arc<ControllerConfig>,
}

impl AppState {
    pub fn new(store: StoreClient, config: ControllerConfig) -> Self {
        Self {
            devices: Arc::new(DeviceRepository::new(store.clone())),
            tasks: Arc::new(TaskRepository::new(store.clone())),
            assignments: Arc::new(AssignmentRepository::new(store.clone())),
            heartbeats: Arc::new(HeartbeatRepository::new(store)),
            config: Arc::new(config),
        }
    }

    /// Bearer-token check for the control API (§4.8). No token configured
    /// means the controller is running open — a local-dev convenience, not
    /// a production default.
    pub fn is_authorized(&self, presented: Option<&str>) -> bool {
        match &self.config.api_key {
            Some(expected) => presented.is_some_and(|token| token == expected),
            None => true,
        }
    }
}
