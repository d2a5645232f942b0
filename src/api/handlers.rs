use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiError;
use crate::client_ip::extract_client_ip;
use crate::config::Config;
use crate::cursor::{CursorData, CursorSigner};
use crate::models::{ClickEvent, NewUrlEntry, ShortenRequest, UrlEntry, UrlStats};
use crate::service::Services;

const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 1000;

pub struct AppState {
    pub services: Services,
    pub config: Arc<Config>,
    pub cursor: CursorSigner,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub click_count: i64,
    /// false when an existing entry was reused
    pub created: bool,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: UrlStats,
    pub short_url: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub urls: Vec<UrlEntry>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct ClicksQuery {
    #[serde(default = "default_clicks_limit")]
    pub limit: i64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

fn default_limit() -> i64 {
    50
}

fn default_clicks_limit() -> i64 {
    100
}

/// Blank optional text is treated as absent.
fn optional_text(
    value: Option<String>,
    field: &str,
    max_chars: usize,
) -> Result<Option<String>, ApiError> {
    match value {
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) if v.chars().count() > max_chars => Err(ApiError::bad_request(format!(
            "{field} is too long, maximum length is {max_chars} characters"
        ))),
        other => Ok(other),
    }
}

/// Create a shortened URL, or return the live one already shortened for it
pub async fn shorten_url(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>), ApiError> {
    let Json(payload) = payload?;
    let title = optional_text(payload.title, "title", MAX_TITLE_LENGTH)?;
    let description = optional_text(payload.description, "description", MAX_DESCRIPTION_LENGTH)?;
    let client_ip = extract_client_ip(&headers, addr.ip(), &state.config.client_ip);

    let (entry, created) = state
        .services
        .shortener
        .shorten(NewUrlEntry {
            original_url: payload.original_url,
            title,
            description,
            expires_at: payload.expires_at,
            created_by_ip: Some(client_ip.to_string()),
        })
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ShortenResponse {
            short_url: state.config.short_url(&entry.short_code),
            short_code: entry.short_code,
            original_url: entry.original_url,
            title: entry.title,
            description: entry.description,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            click_count: entry.click_count,
            created,
        }),
    ))
}

/// Counters and derived liveness for one code
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.services.resolver.stats(&code).await?;
    Ok(Json(StatsResponse {
        short_url: state.config.short_url(&stats.entry.short_code),
        stats,
    }))
}

/// Click history for one code, newest first
pub async fn list_clicks(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<ClicksQuery>,
) -> Result<Json<Vec<ClickEvent>>, ApiError> {
    let clicks = state.services.admin.clicks(&code, query.limit).await?;
    Ok(Json(clicks))
}

/// List shortened URLs, newest first
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let before_id = match query.cursor.as_deref() {
        Some(cursor) => Some(
            state
                .cursor
                .verify(cursor)
                .map_err(|_| ApiError::bad_request("Invalid cursor"))?
                .before_id,
        ),
        None => None,
    };

    let page = state.services.admin.list(query.limit, before_id).await?;

    let next_cursor = page
        .next_before_id
        .map(|before_id| state.cursor.create(&CursorData { before_id }))
        .transpose()
        .map_err(|e| {
            tracing::error!(error = %e, "failed to sign cursor");
            ApiError::internal()
        })?;

    Ok(Json(ListResponse {
        urls: page.entries,
        next_cursor,
    }))
}

/// Deactivate a shortened URL (soft delete)
pub async fn deactivate_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<UrlEntry>, ApiError> {
    let entry = state.services.admin.set_active(&code, false).await?;
    Ok(Json(entry))
}

/// Reactivate a shortened URL
pub async fn reactivate_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<UrlEntry>, ApiError> {
    let entry = state.services.admin.set_active(&code, true).await?;
    Ok(Json(entry))
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
