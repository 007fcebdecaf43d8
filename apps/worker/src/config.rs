// [apps/worker/src/config.rs]
//! Worker configuration (§6.1, §9). Same env-var-through-clap approach as
//! the controller, so the worker binary documents its own contract via
//! `--help` and a standard env file works for both processes.

use clap::Parser;
use distflow_domain_models::device_id::generate_device_id;

#[derive(Parser, Debug, Clone)]
#[command(name = "distflow-worker", about = "Task distribution worker runtime")]
pub struct WorkerConfig {
    /// Stable device id; generated from hostname on first run if unset
    /// (§6.3) and then expected to be pinned via env for subsequent restarts.
    #[arg(long, env = "DEVICE_ID")]
    pub device_id: Option<String>,

    /// Role this process registers as: `worker`, `master`, or `standalone`.
    #[arg(long, env = "DISTRIBUTION_MODE", default_value = "worker")]
    pub device_type: String,

    /// Human-readable label; defaults to the device id when unset.
    #[arg(long, env = "DEVICE_NAME")]
    pub device_name: Option<String>,

    /// Controller base URL host.
    #[arg(long, env = "MASTER_HOST", default_value = "127.0.0.1")]
    pub master_host: String,

    /// Controller base URL port.
    #[arg(long, env = "MASTER_PORT", default_value_t = 8080)]
    pub master_port: u16,

    /// Bearer token presented on every call to the controller; must match
    /// the controller's own `API_KEY` when it enforces one.
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Comma-separated task types this device's executor registry can
    /// handle; advertised as `capabilities.supported_task_types` (§3.1).
    #[arg(long, env = "SUPPORTED_TASK_TYPES", value_delimiter = ',', default_value = "echo")]
    pub supported_task_types: Vec<String>,

    /// How often the heartbeat sender reports in, seconds (§4.7 default 30s).
    #[arg(long, env = "HEARTBEAT_INTERVAL", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Consecutive failed heartbeats before the worker marks itself
    /// disconnected locally — it keeps retrying regardless (§4.7).
    #[arg(long, env = "MAX_CONSECUTIVE_HEARTBEAT_ERRORS", default_value_t = 5)]
    pub max_consecutive_heartbeat_errors: u32,

    /// Upper bound on simultaneously running tasks; also registered as
    /// `max_concurrent_tasks` (§3.1, §6.1 `MAX_TASKS_PER_DEVICE`).
    #[arg(long, env = "MAX_TASKS_PER_DEVICE", default_value_t = 4)]
    pub concurrent_tasks: u32,

    /// Sleep between pull attempts when the controller hands back no work
    /// (§4.7 default 5s).
    #[arg(long, env = "PULL_IDLE_INTERVAL", default_value_t = 5)]
    pub pull_idle_secs: u64,
}

impl WorkerConfig {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn controller_base_url(&self) -> String {
        format!("http://{}:{}", self.master_host, self.master_port)
    }

    /// Resolves the configured id, or mints one from the local hostname
    /// (§6.3, §9 supplemented device-id generation).
    pub fn resolved_device_id(&self) -> String {
        if let Some(id) = &self.device_id {
            return id.clone();
        }
        let hostname = hostname_or_default();
        generate_device_id(&self.device_type, &hostname)
    }

    pub fn resolved_device_name(&self) -> String {
        self.device_name.clone().unwrap_or_else(|| self.resolved_device_id())
    }
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "worker-host".to_string())
}
