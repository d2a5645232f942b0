//! Use cases over the entry store.
//!
//! - [`ShorteningService`] validates URLs, reuses live entries and creates new ones.
//! - [`ResolutionService`] resolves codes, enforces liveness and records clicks.
//! - [`AdminService`] is the operator surface: soft delete, listing, click history.
//!
//! None of them cache anything; every call re-reads the store.

pub mod admin;
pub mod resolution;
pub mod shortening;

pub use admin::{AdminService, EntryPage};
pub use resolution::ResolutionService;
pub use shortening::ShorteningService;

use std::sync::Arc;
use thiserror::Error;

use crate::codec::CodeCodec;
use crate::models::{Liveness, UrlEntry};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid short code")]
    InvalidCode,
    #[error("short URL not found")]
    NotFound,
    #[error("short URL has been deactivated")]
    Inactive,
    #[error("short URL has expired")]
    Expired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => {
                ServiceError::Internal(anyhow::anyhow!("unexpected short code conflict"))
            }
            StorageError::Other(e) => ServiceError::Internal(e),
        }
    }
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Map a non-live entry to the error the caller should see.
pub(crate) fn ensure_live(entry: &UrlEntry, now: i64) -> ServiceResult<()> {
    match entry.liveness_at(now) {
        Liveness::Live => Ok(()),
        Liveness::Inactive => Err(ServiceError::Inactive),
        Liveness::Expired => Err(ServiceError::Expired),
    }
}

/// Decode `code` and load its entry. Codes the codec rejects never reach the store.
pub(crate) async fn lookup(
    storage: &dyn Storage,
    codec: &CodeCodec,
    code: &str,
) -> ServiceResult<UrlEntry> {
    let id = codec.decode(code).map_err(|_| ServiceError::InvalidCode)?;

    let entry = storage
        .get_by_code(code)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if entry.id != id {
        tracing::error!(
            short_code = code,
            decoded_id = id,
            stored_id = entry.id,
            "short code does not match the id it was derived from"
        );
        return Err(ServiceError::Internal(anyhow::anyhow!(
            "short code {code} is bound to id {} but decodes to {id}",
            entry.id
        )));
    }

    Ok(entry)
}

/// All three services over one store and codec.
#[derive(Clone)]
pub struct Services {
    pub shortener: Arc<ShorteningService>,
    pub resolver: Arc<ResolutionService>,
    pub admin: Arc<AdminService>,
}

impl Services {
    pub fn new(storage: Arc<dyn Storage>, codec: Arc<CodeCodec>) -> Self {
        Self {
            shortener: Arc::new(ShorteningService::new(
                Arc::clone(&storage),
                Arc::clone(&codec),
            )),
            resolver: Arc::new(ResolutionService::new(
                Arc::clone(&storage),
                Arc::clone(&codec),
            )),
            admin: Arc::new(AdminService::new(storage, codec)),
        }
    }
}
