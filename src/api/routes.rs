use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::cursor::CursorSigner;
use crate::service::Services;

use super::handlers::{
    deactivate_url, get_stats, health_check, list_clicks, list_urls, reactivate_url,
    shorten_url, AppState,
};

pub fn create_api_router(services: Services, config: Arc<Config>) -> Router {
    let cursor = CursorSigner::new(config.pagination.cursor_hmac_secret.as_deref());
    let state = Arc::new(AppState {
        services,
        config,
        cursor,
    });

    Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/shorten", post(shorten_url))
        .route("/api/v1/stats/{code}", get(get_stats))
        .route("/api/v1/stats/{code}/clicks", get(list_clicks))
        .route("/api/v1/urls", get(list_urls))
        .route("/api/v1/urls/{code}/deactivate", post(deactivate_url))
        .route("/api/v1/urls/{code}/reactivate", post(reactivate_url))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
