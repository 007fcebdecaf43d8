// [apps/worker/src/executor.rs]
//! The executor contract (§4.7, §9). The core only specifies this call
//! boundary — cookie/session refresh, 2FA, captcha and the rest of the
//! actual third-party scraping logic are entirely the registered
//! implementation's problem, never the runtime's.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("no executor registered for task type {0}")]
    Unregistered(String),

    #[error("executor failed: {0}")]
    Failed(String),

    #[error("executor panicked")]
    Panicked,
}

/// One task type's handler. `execute` receives the task's opaque payload
/// verbatim and returns either a result value or a failure reason; neither
/// side of this boundary knows anything about HTTP, retries or backoff —
/// that's the runtime's job (§4.7).
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, payload: serde_json::Value) -> Result<serde_json::Value, ExecutorError>;
}

/// Maps `task_type` to its handler. A worker with no executor registered
/// for a pulled task's type reports it failed immediately rather than
/// stalling the pool on it (§7 "Bad input").
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(task_type.into(), executor);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(task_type).cloned()
    }
}

/// A trivial executor that echoes its payload back as the result. Useful
/// for exercising the runtime end to end (registration, pull, report)
/// without a real analytics-scraping implementation wired in.
pub struct EchoExecutor;

#[async_trait]
impl TaskExecutor for EchoExecutor {
    async fn execute(&self, payload: serde_json::Value) -> Result<serde_json::Value, ExecutorError> {
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_returns_none_for_unknown_task_type() {
        let registry = ExecutorRegistry::new();
        assert!(registry.get("fetch_report").is_none());
    }

    #[tokio::test]
    async fn echo_executor_returns_its_input() {
        let mut registry = ExecutorRegistry::new();
        registry.register("echo", Arc::new(EchoExecutor));

        let executor = registry.get("echo").expect("registered");
        let payload = serde_json::json!({"a": 1});
        let result = executor.execute(payload.clone()).await.unwrap();
        assert_eq!(result, payload);
    }
}
