use crate::codec::CodeCodec;
use crate::models::{ClickEvent, ClickMetadata, NewUrlEntry, UrlEntry};
use crate::storage::{map_write_error, Storage, StorageError, StorageResult, URL_COLUMNS};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // short_code stays NULL only inside the creating transaction
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT UNIQUE,
                original_url TEXT NOT NULL,
                title TEXT,
                description TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1,
                click_count INTEGER NOT NULL DEFAULT 0,
                last_accessed_at INTEGER,
                created_by_ip TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_urls_original_url ON urls(original_url)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS url_clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url_id INTEGER NOT NULL REFERENCES urls(id),
                clicked_at INTEGER NOT NULL,
                ip_address TEXT,
                user_agent TEXT,
                referer TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_url_clicks_url_time ON url_clicks(url_id, clicked_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create(
        &self,
        entry: &NewUrlEntry,
        codec: &CodeCodec,
        now: i64,
    ) -> StorageResult<UrlEntry> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO urls (original_url, title, description, created_at, updated_at,
                              expires_at, is_active, click_count, created_by_ip)
            VALUES (?, ?, ?, ?, ?, ?, 1, 0, ?)
            RETURNING id
            "#,
        )
        .bind(&entry.original_url)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(now)
        .bind(now)
        .bind(entry.expires_at)
        .bind(&entry.created_by_ip)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let short_code = codec
            .encode(id)
            .map_err(|e| StorageError::Other(e.into()))?;

        let created = sqlx::query_as::<_, UrlEntry>(&format!(
            "UPDATE urls SET short_code = ? WHERE id = ? RETURNING {URL_COLUMNS}"
        ))
        .bind(&short_code)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        Ok(created)
    }

    async fn get_by_code(&self, short_code: &str) -> Result<Option<UrlEntry>> {
        let url = sqlx::query_as::<_, UrlEntry>(&format!(
            "SELECT {URL_COLUMNS} FROM urls WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UrlEntry>> {
        let url = sqlx::query_as::<_, UrlEntry>(&format!(
            "SELECT {URL_COLUMNS} FROM urls WHERE id = ? AND short_code IS NOT NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn find_by_original_url(
        &self,
        original_url: &str,
        now: i64,
    ) -> Result<Option<UrlEntry>> {
        let url = sqlx::query_as::<_, UrlEntry>(&format!(
            r#"
            SELECT {URL_COLUMNS}
            FROM urls
            WHERE original_url = ?
              AND short_code IS NOT NULL
              AND is_active = 1
              AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY id DESC
            LIMIT 1
            "#
        ))
        .bind(original_url)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn increment_click(
        &self,
        id: i64,
        click: &ClickMetadata,
        now: i64,
    ) -> Result<Option<UrlEntry>> {
        let mut tx = self.pool.begin().await?;

        // The UPDATE comes first so the write lock is taken before anything is read.
        let updated = sqlx::query_as::<_, UrlEntry>(&format!(
            r#"
            UPDATE urls
            SET click_count = click_count + 1,
                last_accessed_at = ?
            WHERE id = ?
              AND is_active = 1
              AND (expires_at IS NULL OR expires_at > ?)
            RETURNING {URL_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO url_clicks (url_id, clicked_at, ip_address, user_agent, referer)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(&click.ip_address)
        .bind(&click.user_agent)
        .bind(&click.referer)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn set_active(&self, short_code: &str, active: bool, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_active = ?, updated_at = ?
            WHERE short_code = ?
            "#,
        )
        .bind(active)
        .bind(now)
        .bind(short_code)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, before_id: Option<i64>) -> Result<Vec<UrlEntry>> {
        let urls = if let Some(before_id) = before_id {
            sqlx::query_as::<_, UrlEntry>(&format!(
                r#"
                SELECT {URL_COLUMNS}
                FROM urls
                WHERE short_code IS NOT NULL AND id < ?
                ORDER BY id DESC
                LIMIT ?
                "#
            ))
            .bind(before_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, UrlEntry>(&format!(
                r#"
                SELECT {URL_COLUMNS}
                FROM urls
                WHERE short_code IS NOT NULL
                ORDER BY id DESC
                LIMIT ?
                "#
            ))
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(urls)
    }

    async fn list_clicks(&self, url_id: i64, limit: i64) -> Result<Vec<ClickEvent>> {
        let clicks = sqlx::query_as::<_, ClickEvent>(
            r#"
            SELECT id, url_id, clicked_at, ip_address, user_agent, referer
            FROM url_clicks
            WHERE url_id = ?
            ORDER BY clicked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(url_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }
}
