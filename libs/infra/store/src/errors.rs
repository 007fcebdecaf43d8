// [libs/infra/store/src/errors.rs]
//! Internal error taxonomy for the store (§7). Transport-independent: the
//! controller's HTTP layer maps these onto status codes, this crate never
//! knows about HTTP.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    ConnectionError(String),

    #[error("store configuration error: {0}")]
    ConfigurationError(String),

    #[error("store query error: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("store mapping error: {0}")]
    MappingError(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(i64),

    #[error("assignment ownership conflict")]
    OwnershipConflict,
}
