use std::sync::Arc;

use tracing::info;

use super::{lookup, unix_now, ServiceError, ServiceResult};
use crate::codec::CodeCodec;
use crate::models::{ClickEvent, UrlEntry};
use crate::storage::Storage;

/// Largest page the listing operations return.
pub const MAX_PAGE_SIZE: i64 = 200;

/// One page of entries, newest first.
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<UrlEntry>,
    /// Id to continue below, present when the page was full.
    pub next_before_id: Option<i64>,
}

pub struct AdminService {
    storage: Arc<dyn Storage>,
    codec: Arc<CodeCodec>,
}

impl AdminService {
    pub fn new(storage: Arc<dyn Storage>, codec: Arc<CodeCodec>) -> Self {
        Self { storage, codec }
    }

    /// Enable or disable an entry. Disabling keeps the row and its clicks.
    pub async fn set_active(&self, code: &str, active: bool) -> ServiceResult<UrlEntry> {
        lookup(self.storage.as_ref(), &self.codec, code).await?;

        if !self.storage.set_active(code, active, unix_now()).await? {
            return Err(ServiceError::NotFound);
        }

        info!(short_code = code, active, "changed entry status");

        self.storage
            .get_by_code(code)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    pub async fn list(&self, limit: i64, before_id: Option<i64>) -> ServiceResult<EntryPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let entries = self.storage.list(limit, before_id).await?;

        let next_before_id = if entries.len() as i64 == limit {
            entries.last().map(|e| e.id)
        } else {
            None
        };

        Ok(EntryPage {
            entries,
            next_before_id,
        })
    }

    pub async fn clicks(&self, code: &str, limit: i64) -> ServiceResult<Vec<ClickEvent>> {
        let entry = lookup(self.storage.as_ref(), &self.codec, code).await?;
        let clicks = self
            .storage
            .list_clicks(entry.id, limit.clamp(1, MAX_PAGE_SIZE))
            .await?;
        Ok(clicks)
    }
}
