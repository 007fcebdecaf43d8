// [apps/controller/src/services/mod.rs]
pub mod daily_reset;
pub mod dispatcher;
pub mod heartbeat_collector;
pub mod policy;
pub mod reaper;
pub mod rebalancer;

pub use daily_reset::spawn_daily_reset;
pub use dispatcher::spawn_dispatcher;
pub use heartbeat_collector::spawn_heartbeat_sweeper;
pub use reaper::spawn_reaper;
