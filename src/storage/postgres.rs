use crate::codec::CodeCodec;
use crate::models::{ClickEvent, ClickMetadata, NewUrlEntry, UrlEntry};
use crate::storage::{map_write_error, Storage, StorageError, StorageResult, URL_COLUMNS};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT UNIQUE,
                original_url TEXT NOT NULL,
                title TEXT,
                description TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                expires_at BIGINT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                click_count BIGINT NOT NULL DEFAULT 0,
                last_accessed_at BIGINT,
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
                id BIGSERIAL PRIMARY KEY,
                url_id BIGINT NOT NULL REFERENCES urls(id),
                clicked_at BIGINT NOT NULL,
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
            VALUES ($1, $2, $3, $4, $4, $5, TRUE, 0, $6)
            RETURNING id
            "#,
        )
        .bind(&entry.original_url)
        .bind(&entry.title)
        .bind(&entry.description)
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
            "UPDATE urls SET short_code = $1 WHERE id = $2 RETURNING {URL_COLUMNS}"
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
            "SELECT {URL_COLUMNS} FROM urls WHERE short_code = $1"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UrlEntry>> {
        let url = sqlx::query_as::<_, UrlEntry>(&format!(
            "SELECT {URL_COLUMNS} FROM urls WHERE id = $1 AND short_code IS NOT NULL"
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
            WHERE original_url = $1
              AND short_code IS NOT NULL
              AND is_active
              AND (expires_at IS NULL OR expires_at > $2)
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

        // The row lock taken here serializes concurrent increments; the WHERE
        // clause is re-checked against the latest row version.
        let updated = sqlx::query_as::<_, UrlEntry>(&format!(
            r#"
            UPDATE urls
            SET click_count = click_count + 1,
                last_accessed_at = $1
            WHERE id = $2
              AND is_active
              AND (expires_at IS NULL OR expires_at > $1)
            RETURNING {URL_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO url_clicks (url_id, clicked_at, ip_address, user_agent, referer)
            VALUES ($1, $2, $3, $4, $5)
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
            SET is_active = $1, updated_at = $2
            WHERE short_code = $3
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
                WHERE short_code IS NOT NULL AND id < $1
                ORDER BY id DESC
                LIMIT $2
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
                LIMIT $1
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
            WHERE url_id = $1
            ORDER BY clicked_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(url_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }
}
