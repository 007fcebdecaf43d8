// [apps/controller/src/config.rs]
//! Controller configuration (§6.1, §9). Env vars are read through clap's
//! `env` feature so the same struct is both a `--help` surface and the
//! canonical list of variables operators can set; CLI flags win over env
//! when both are present, matching clap's default precedence.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "distflow-controller", about = "Task distribution controller")]
pub struct ControllerConfig {
    /// Relational store URL: a local file path, `:memory:`, or a
    /// `libsql://`/`https://` remote endpoint.
    #[arg(long, env = "DATABASE_URL", default_value = "distflow.db")]
    pub database_url: String,

    /// Access token for a remote libsql/Turso store; unused for local files.
    #[arg(long, env = "TURSO_AUTH_TOKEN")]
    pub database_token: Option<String>,

    /// TCP port the control API listens on.
    #[arg(long, env = "MASTER_PORT", default_value_t = 8080)]
    pub master_port: u16,

    /// Bearer token required on every control API request except `/health`.
    /// No auth is enforced when unset — intended for local development only.
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// How often the dispatcher tick runs (dispatch + reap + reset), seconds.
    #[arg(long, env = "DISPATCH_INTERVAL", default_value_t = 10)]
    pub dispatch_interval_secs: u64,

    /// Seconds since `last_heartbeat` before the collector's sweeper marks a
    /// device offline and releases its open tasks (§4.2).
    #[arg(long, env = "OFFLINE_TIMEOUT", default_value_t = 300)]
    pub offline_timeout_secs: i64,

    /// Default assignment age (seconds) the reaper treats as timed out when
    /// a task carries no `execution_timeout` of its own (§4.5).
    #[arg(long, env = "DEFAULT_EXECUTION_TIMEOUT", default_value_t = 1800)]
    pub default_execution_timeout_secs: i64,

    /// Dispatch policy: `round_robin`, `least_tasks`, `weighted`, or `random` (§4.4).
    #[arg(long, env = "LOAD_BALANCE_STRATEGY", default_value = "least_tasks")]
    pub load_balance_strategy: String,

    /// When set, the dispatcher switches to `least_tasks` under sustained
    /// queue pressure regardless of the configured policy (§4.4 adaptive
    /// switching), reverting once the backlog drains.
    #[arg(long, env = "ADAPTIVE_POLICY", default_value_t = true)]
    pub adaptive_policy: bool,

    /// Pending-queue depth that triggers the adaptive switch above.
    #[arg(long, env = "ADAPTIVE_POLICY_THRESHOLD", default_value_t = 200)]
    pub adaptive_policy_threshold: i64,

    /// Task priority strictly above which a task is placed even onto a
    /// device with no registered capability match (§4.4/§9 open question —
    /// kept configurable rather than a hardcoded constant).
    #[arg(long, env = "FORCE_DISPATCH_PRIORITY_THRESHOLD", default_value_t = 5)]
    pub force_dispatch_priority_threshold: i32,

    /// Fallback max concurrent tasks used by `ListAvailable`/dispatch sizing
    /// when a device hasn't reported one (§6.1 `MAX_TASKS_PER_DEVICE`).
    #[arg(long, env = "MAX_TASKS_PER_DEVICE", default_value_t = 4)]
    pub max_tasks_per_device: u32,

    /// Heartbeat retention window for `POST /management/cleanup` (§3.4, §6.1).
    #[arg(long, env = "HEARTBEAT_RETENTION_DAYS", default_value_t = 7)]
    pub heartbeat_retention_days: i64,

    /// Local hour (0-23) at which `ZeroPending` runs once a day (§4.3).
    #[arg(long, env = "DAILY_RESET_HOUR", default_value_t = 0)]
    pub daily_reset_hour: u32,
}

impl ControllerConfig {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}
