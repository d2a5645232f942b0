use std::sync::Arc;

use tracing::debug;

use super::{ensure_live, lookup, unix_now, ServiceError, ServiceResult};
use crate::codec::CodeCodec;
use crate::models::{ClickMetadata, UrlEntry, UrlStats};
use crate::storage::Storage;

pub struct ResolutionService {
    storage: Arc<dyn Storage>,
    codec: Arc<CodeCodec>,
}

impl ResolutionService {
    pub fn new(storage: Arc<dyn Storage>, codec: Arc<CodeCodec>) -> Self {
        Self { storage, codec }
    }

    /// Resolve `code` for a redirect and record the click.
    ///
    /// Liveness is evaluated from the stored row on every call. The counter
    /// update is conditional on the entry still being live, so a concurrent
    /// deactivation can never be followed by a recorded click.
    pub async fn resolve(&self, code: &str, click: ClickMetadata) -> ServiceResult<UrlEntry> {
        let entry = lookup(self.storage.as_ref(), &self.codec, code).await?;
        let now = unix_now();

        if let Err(e) = ensure_live(&entry, now) {
            debug!(short_code = code, reason = %e, "refusing to resolve");
            return Err(e);
        }

        if let Some(updated) = self.storage.increment_click(entry.id, &click, now).await? {
            return Ok(updated);
        }

        // Liveness changed between the read and the write.
        let current = self
            .storage
            .get_by_id(entry.id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        ensure_live(&current, now)?;

        Err(ServiceError::Internal(anyhow::anyhow!(
            "click on live entry {code} was not recorded"
        )))
    }

    /// Entry metadata without a liveness check or a click.
    pub async fn info(&self, code: &str) -> ServiceResult<UrlEntry> {
        lookup(self.storage.as_ref(), &self.codec, code).await
    }

    /// Counters plus derived expiry, without side effects.
    pub async fn stats(&self, code: &str) -> ServiceResult<UrlStats> {
        let entry = lookup(self.storage.as_ref(), &self.codec, code).await?;
        let is_expired = entry.is_expired_at(unix_now());
        Ok(UrlStats { entry, is_expired })
    }
}
