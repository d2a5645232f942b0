//! Management API integration tests

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shrt::api;
use shrt::codec::CodeCodec;
use shrt::config::{
    ClientIpConfig, CodecConfig, Config, DatabaseBackend, DatabaseConfig, PaginationConfig,
    RedirectMode, ServerConfig,
};
use shrt::models::ClickMetadata;
use shrt::service::Services;
use shrt::storage::{SqliteStorage, Storage};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const TEST_SALT: &str = "api-integration-salt";

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        database: DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        api_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        redirect_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        base_domain: "https://sh.rt".to_string(),
        codec: CodecConfig {
            salt: TEST_SALT.to_string(),
            min_length: 6,
        },
        client_ip: ClientIpConfig::default(),
        pagination: PaginationConfig {
            cursor_hmac_secret: Some("api-test-cursor-secret".to_string()),
        },
        redirect_status: RedirectMode::default(),
    })
}

/// Helper to create the API router and the store behind it
async fn create_test_app() -> (Router, Services, Arc<dyn Storage>) {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    let codec = Arc::new(CodeCodec::new(TEST_SALT, 6).unwrap());
    let services = Services::new(Arc::clone(&storage), codec);

    let app = api::create_api_router(services.clone(), test_config())
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))));
    (app, services, storage)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn shorten(app: &Router, url: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/shorten",
        Some(json!({ "original_url": url })),
    )
    .await
}

#[tokio::test]
async fn test_shorten_creates_then_reuses() {
    let (app, _, _) = create_test_app().await;

    let (status, first) = shorten(&app, "https://example.com/article").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);
    assert_eq!(first["original_url"], "https://example.com/article");
    assert_eq!(first["click_count"], 0);
    let code = first["short_code"].as_str().unwrap().to_string();
    assert_eq!(first["short_url"], format!("https://sh.rt/{code}"));

    let (status, second) = shorten(&app, "https://example.com/article").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["short_code"], code.as_str());
}

#[tokio::test]
async fn test_shorten_with_metadata_records_creator_ip() {
    let (app, _, storage) = create_test_app().await;

    let expires_at = chrono::Utc::now().timestamp() + 3600;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/shorten",
        Some(json!({
            "original_url": "https://example.com/launch",
            "title": "Launch notes",
            "description": "Everything that shipped",
            "expires_at": expires_at,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Launch notes");
    assert_eq!(body["description"], "Everything that shipped");
    assert_eq!(body["expires_at"], expires_at);

    let entry = storage
        .get_by_code(body["short_code"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.created_by_ip.as_deref(), Some("127.0.0.1"));
}

#[tokio::test]
async fn test_shorten_rejects_invalid_input() {
    let (app, _, _) = create_test_app().await;

    for url in ["not a url", "ftp://example.com/file", ""] {
        let (status, body) = shorten(&app, url).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{url:?}");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid URL"));
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/shorten",
        Some(json!({
            "original_url": "https://example.com/",
            "title": "t".repeat(201),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/shorten",
        Some(json!({
            "original_url": "https://example.com/",
            "description": "d".repeat(1001),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shorten_rejects_malformed_body() {
    let (app, _, _) = create_test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/shorten",
        Some(json!({ "title": "no url" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/shorten")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/shorten")
        .body(Body::from(r#"{"original_url":"https://example.com/"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::BAD_REQUEST,
        "missing content type"
    );
}

#[tokio::test]
async fn test_stats() {
    let (app, services, _) = create_test_app().await;

    let (_, created) = shorten(&app, "https://example.com/counted").await;
    let code = created["short_code"].as_str().unwrap().to_string();

    for _ in 0..3 {
        services
            .resolver
            .resolve(&code, ClickMetadata::default())
            .await
            .unwrap();
    }

    let (status, stats) = send(&app, Method::GET, &format!("/api/v1/stats/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["short_code"], code.as_str());
    assert_eq!(stats["click_count"], 3);
    assert_eq!(stats["is_active"], true);
    assert_eq!(stats["is_expired"], false);
    assert_eq!(stats["short_url"], format!("https://sh.rt/{code}"));
    assert!(stats["last_accessed_at"].is_i64());
}

#[tokio::test]
async fn test_stats_unknown_code() {
    let (app, _, _) = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/stats/zzzzzzzz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Short URL not found");
}

#[tokio::test]
async fn test_click_history() {
    let (app, services, _) = create_test_app().await;

    let (_, created) = shorten(&app, "https://example.com/history").await;
    let code = created["short_code"].as_str().unwrap().to_string();

    for agent in ["agent-a", "agent-b"] {
        services
            .resolver
            .resolve(
                &code,
                ClickMetadata {
                    user_agent: Some(agent.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let (status, clicks) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stats/{code}/clicks?limit=10"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let clicks = clicks.as_array().unwrap();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0]["user_agent"], "agent-b", "newest click first");
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let (app, _, _) = create_test_app().await;

    let (_, created) = shorten(&app, "https://example.com/toggle").await;
    let code = created["short_code"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/urls/{code}/deactivate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    // A disabled entry is not reused
    let (status, replacement) = shorten(&app, "https://example.com/toggle").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(replacement["short_code"], code.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/urls/{code}/reactivate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/urls/zzzzzzzz/deactivate",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_with_cursor_pagination() {
    let (app, _, _) = create_test_app().await;

    for i in 0..3 {
        shorten(&app, &format!("https://example.com/page/{i}")).await;
    }

    let (status, page) = send(&app, Method::GET, "/api/v1/urls?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let urls = page["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["original_url"], "https://example.com/page/2");
    assert_eq!(urls[1]["original_url"], "https://example.com/page/1");
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let (status, page) = send(
        &app,
        Method::GET,
        &format!("/api/v1/urls?limit=2&cursor={cursor}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let urls = page["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["original_url"], "https://example.com/page/0");
    assert!(page["next_cursor"].is_null());
}

#[tokio::test]
async fn test_list_rejects_tampered_cursor() {
    let (app, _, _) = create_test_app().await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/urls?cursor=eyJiZWZvcmVfaWQiOjEwMH0.bogus",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid cursor");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}
