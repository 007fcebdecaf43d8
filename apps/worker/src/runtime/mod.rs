// [apps/worker/src/runtime/mod.rs]
pub mod executor_pool;
pub mod heartbeat;
pub mod puller;

pub use heartbeat::spawn_heartbeat_sender;
pub use puller::spawn_task_puller;
