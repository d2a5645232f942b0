use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{
        header::{HeaderMap, HeaderName, CACHE_CONTROL, LOCATION, REFERER, USER_AGENT},
        HeaderValue,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::middleware::RequestStart;
use crate::api::ApiError;
use crate::client_ip::extract_client_ip;
use crate::config::Config;
use crate::models::{ClickMetadata, UrlEntry};
use crate::service::Services;

const TIMING_HEADER: HeaderName = HeaderName::from_static("x-shrt-timing-total-ms");

pub struct RedirectState {
    pub services: Services,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub info: Option<String>,
}

impl RedirectQuery {
    fn wants_info(&self) -> bool {
        self.info
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Preview of where a code leads, served by `?info=true`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub original_url: String,
    pub short_code: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl From<UrlEntry> for InfoResponse {
    fn from(entry: UrlEntry) -> Self {
        Self {
            original_url: entry.original_url,
            short_code: entry.short_code,
            title: entry.title,
            description: entry.description,
        }
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Redirect to original URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Query(query): Query<RedirectQuery>,
    Extension(request_start): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if query.wants_info() {
        return match state.services.resolver.info(&code).await {
            Ok(entry) => Json(InfoResponse::from(entry)).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        };
    }

    let click = ClickMetadata {
        ip_address: Some(extract_client_ip(&headers, addr.ip(), &state.config.client_ip).to_string()),
        user_agent: header_string(&headers, USER_AGENT),
        referer: header_string(&headers, REFERER),
    };

    let entry = match state.services.resolver.resolve(&code, click).await {
        Ok(entry) => entry,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let location = match HeaderValue::from_str(&entry.original_url) {
        Ok(location) => location,
        Err(e) => {
            tracing::error!(short_code = %code, error = %e, "stored URL is not a valid header value");
            return ApiError::internal().into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(LOCATION, location);
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert(
        TIMING_HEADER,
        HeaderValue::from(request_start.elapsed_ms()),
    );

    (state.config.redirect_status.status_code(), response_headers).into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
