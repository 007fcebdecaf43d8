// [libs/infra/worker-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: WORKER UPLINK CLIENT (ESTRATO L3)
 * RESPONSABILIDAD: COMUNICACIÓN HTTP ENTRE WORKER Y CONTROLADOR
 *
 * One client per worker process. Holds a pooled `reqwest::Client` with
 * the bearer token baked into its default headers (§6.1) so every call
 * site stays a one-liner.
 * =================================================================
 */

use std::future::Future;
use std::time::Duration;

use distflow_domain_models::api::{
    HeartbeatRequest, RegisterDeviceRequest, UpdateTaskStatusRequest,
};
use distflow_domain_models::task::Task;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{instrument, warn};

use crate::errors::ClientError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bounded retry with exponential backoff for outgoing controller calls
/// (§5): three attempts total, starting at 250ms and doubling, capped at
/// 2s. Only network faults and 5xx rejections are worth retrying — a 4xx
/// means the request itself is wrong and retrying it changes nothing.
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

fn is_transient(error: &ClientError) -> bool {
    matches!(error, ClientError::NetworkFault(_)) || matches!(error, ClientError::ServerRejection(status) if *status >= 500)
}

async fn with_retry<F, Fut, T>(mut attempt: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut delay = INITIAL_BACKOFF;

    for remaining in (0..MAX_ATTEMPTS).rev() {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) if remaining > 0 && is_transient(&error) => {
                warn!(%error, retrying_in_ms = delay.as_millis() as u64, "worker client: transient failure, retrying");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
            Err(error) => return Err(error),
        }
    }

    unreachable!("loop always returns on its final iteration")
}

pub struct WorkerClient {
    http: Client,
    base_url: String,
}

impl WorkerClient {
    pub fn new(base_url: &str, bearer_token: Option<&str>) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = bearer_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::Unauthorized)?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/api/distribution", base_url.trim_end_matches('/')),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn register_device(&self, request: &RegisterDeviceRequest) -> Result<(), ClientError> {
        let url = format!("{}/devices/register", self.base_url);
        with_retry(|| async {
            let response = self.http.post(&url).json(request).send().await?;
            check_status(response).await.map(|_| ())
        })
        .await
    }

    #[instrument(skip(self, request))]
    pub async fn send_heartbeat(&self, request: &HeartbeatRequest) -> Result<(), ClientError> {
        let url = format!("{}/devices/{}/heartbeat", self.base_url, request.device_id);
        with_retry(|| async {
            let response = self.http.post(&url).json(request).send().await?;
            check_status(response).await.map(|_| ())
        })
        .await
    }

    /// Pulls up to `limit` tasks already assigned to this device (§4.7
    /// task puller). An empty result is not an error — the caller sleeps
    /// and retries, it does not treat zero tasks as `NoTaskAvailable`.
    #[instrument(skip(self))]
    pub async fn pull_assigned_tasks(&self, device_id: &str, limit: u32) -> Result<Vec<Task>, ClientError> {
        let url = format!("{}/tasks/{}/pull?limit={}", self.base_url, device_id, limit.min(10));
        with_retry(|| async {
            let response = self.http.get(&url).send().await?;
            let response = check_status(response).await?;
            Ok(response.json::<Vec<Task>>().await?)
        })
        .await
    }

    #[instrument(skip(self, request))]
    pub async fn report_task_status(&self, request: &UpdateTaskStatusRequest) -> Result<(), ClientError> {
        let url = format!("{}/tasks/status", self.base_url);
        with_retry(|| async {
            let response = self.http.put(&url).json(request).send().await?;
            check_status(response).await.map(|_| ())
        })
        .await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    match response.status() {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized),
        status => {
            warn!(%status, "controller rejected request");
            Err(ClientError::ServerRejection(status.as_u16()))
        }
    }
}
