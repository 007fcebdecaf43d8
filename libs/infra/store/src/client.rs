// [libs/infra/store/src/client.rs]
/*!
 * =================================================================
 * APARATO: STORE CONNECTION CLIENT
 * RESPONSABILIDAD: GESTIÓN DE ENLACES Y BOOTSTRAP DE ESQUEMA
 *
 * Wraps a libsql `Database` handle. libsql gives us one driver for three
 * deployment shapes — local file, embedded `:memory:` (used by the test
 * suite), and a remote libsql/Turso-compatible endpoint — without having to
 * carry a second sync/async client pair for the same surface.
 * =================================================================
 */

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::schema::apply_schema;

#[derive(Clone)]
pub struct StoreClient {
    driver: Arc<Database>,
    /// Keeps an in-memory database alive across connections; SQLite drops
    /// an in-memory db's contents once its last connection closes.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    #[instrument(skip(access_token))]
    pub async fn connect(url: &str, access_token: Option<String>) -> Result<Self, StoreError> {
        if url.is_empty() {
            return Err(StoreError::ConnectionError("database url is empty".into()));
        }

        info!(url, "store: connecting");

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:");

        let driver = if is_remote {
            let token = access_token.ok_or_else(|| {
                StoreError::ConnectionError("remote store requires an access token".into())
            })?;
            Builder::new_remote(url.to_string(), token)
                .build()
                .await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = driver
                .connect()
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
            apply_schema(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
        } else {
            let bootstrap_conn = driver
                .connect()
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
            apply_schema(&bootstrap_conn).await?;
        }

        Ok(Self {
            driver,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.driver
            .connect()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }
}
