// [apps/controller/src/lib.rs]
//! Controller library root: device registry, heartbeat collector, task
//! queue, dispatcher, timeout reaper, rebalancer and the control API that
//! fronts all of it (§4.1–§4.8).

pub mod config;
pub mod errors;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::ControllerConfig;
    pub use crate::kernel::ControllerKernel;
    pub use crate::state::AppState;
}
