pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::config::{DatabaseBackend, DatabaseConfig};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Column list shared by every query that materializes a [`crate::models::UrlEntry`].
pub(crate) const URL_COLUMNS: &str = "id, short_code, original_url, title, description, \
     created_at, updated_at, expires_at, is_active, click_count, last_accessed_at, created_by_ip";

/// Unique violations become [`StorageError::Conflict`]; anything else is opaque.
pub(crate) fn map_write_error(err: sqlx::Error) -> StorageError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Other(err.into())
}

/// Connect the configured backend and make sure its schema exists.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(PostgresStorage::new(&config.url, config.max_connections).await?)
        }
    };

    storage.init().await?;
    info!("Database initialized successfully");

    Ok(storage)
}
