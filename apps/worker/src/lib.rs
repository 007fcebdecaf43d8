// [apps/worker/src/lib.rs]
//! Worker runtime library root (C9, §4.7): heartbeat sender, task puller,
//! bounded executor pool, and the pluggable executor registry the
//! analytics-scraping logic plugs into.

pub mod config;
pub mod executor;
pub mod kernel;
pub mod runtime;
pub mod state;

pub mod prelude {
    pub use crate::config::WorkerConfig;
    pub use crate::executor::{EchoExecutor, ExecutorError, ExecutorRegistry, TaskExecutor};
    pub use crate::kernel::WorkerKernel;
    pub use crate::state::WorkerState;
}
