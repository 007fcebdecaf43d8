// [libs/infra/worker-client/src/errors.rs]
//! =================================================================
//! APARATO: WORKER CLIENT ERRORS
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE COMUNICACIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network fault talking to controller: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("failed to decode controller response: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("controller rejected request: HTTP {0}")]
    ServerRejection(u16),

    #[error("bearer token rejected by controller")]
    Unauthorized,

    #[error("no task was available to claim")]
    NoTaskAvailable,
}
