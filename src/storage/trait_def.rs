use crate::codec::CodeCodec;
use crate::models::{ClickEvent, ClickMetadata, NewUrlEntry, UrlEntry};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable mapping from short code to URL entry, plus the click history.
///
/// Every mutation is a single atomic statement or transaction; callers never
/// read-modify-write through this interface.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a new entry. The store assigns the id (strictly increasing,
    /// never reused) and derives `short_code` from it with `codec` inside the
    /// same transaction.
    ///
    /// Returns [`StorageError::Conflict`] if the derived code is already taken,
    /// which means the codec or the id sequence has been tampered with.
    async fn create(
        &self,
        entry: &NewUrlEntry,
        codec: &CodeCodec,
        now: i64,
    ) -> StorageResult<UrlEntry>;

    /// Get an entry by short code
    async fn get_by_code(&self, short_code: &str) -> Result<Option<UrlEntry>>;

    /// Get an entry by id
    async fn get_by_id(&self, id: i64) -> Result<Option<UrlEntry>>;

    /// Most recent entry for exactly `original_url` that is active and not
    /// expired at `now`.
    async fn find_by_original_url(&self, original_url: &str, now: i64)
        -> Result<Option<UrlEntry>>;

    /// Atomically bump `click_count`, set `last_accessed_at` and append a
    /// click event, but only while the entry is still live at `now`.
    ///
    /// Returns `None` when no live entry with that id exists at write time.
    async fn increment_click(
        &self,
        id: i64,
        click: &ClickMetadata,
        now: i64,
    ) -> Result<Option<UrlEntry>>;

    /// Flip `is_active` (soft delete / reactivate). Returns false if no entry
    /// has that code.
    async fn set_active(&self, short_code: &str, active: bool, now: i64) -> Result<bool>;

    /// Newest entries first, starting strictly below `before_id` when given.
    async fn list(&self, limit: i64, before_id: Option<i64>) -> Result<Vec<UrlEntry>>;

    /// Newest click events first for one entry.
    async fn list_clicks(&self, url_id: i64, limit: i64) -> Result<Vec<ClickEvent>>;
}
