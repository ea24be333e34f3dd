//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gophkeeper_core::config::{AppConfig, DatabaseConfig};
use gophkeeper_server::{AppState, create_router};
use gophkeeper_store::{LimiterParams, SqliteStore, VaultStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with a temporary SQLite store.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_testing()).await
    }

    /// Create a test server with a customized configuration. The database
    /// setting is always replaced with a per-test temp file.
    pub async fn with_config(mut config: AppConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("vault.db");
        config.database = DatabaseConfig::Sqlite {
            path: db_path.clone(),
        };

        let store: Arc<dyn VaultStore> = Arc::new(
            SqliteStore::new(&db_path, LimiterParams::from(&config.limiter))
                .await
                .expect("failed to create store"),
        );

        let state = AppState::new(config, store);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }
}

/// Make a JSON request against the router.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    json_request_from_ip(router, method, uri, body, auth_token, None).await
}

/// Make a JSON request with a forwarded client IP (the test config trusts
/// X-Forwarded-For).
#[allow(dead_code)]
pub async fn json_request_from_ip(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
    ip: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    if let Some(ip) = ip {
        builder = builder.header("X-Forwarded-For", ip);
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Register a user and return the assigned id.
#[allow(dead_code)]
pub async fn register(router: &axum::Router, username: &str, password: &str) -> Uuid {
    let (status, body) = json_request(
        router,
        "POST",
        "/v1/auth/register",
        Some(serde_json::json!({ "username": username, "password": password })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["user_id"].as_str().unwrap().parse().unwrap()
}

/// Log in and return the raw login response body.
#[allow(dead_code)]
pub async fn login(router: &axum::Router, username: &str, password: &str) -> Value {
    let (status, body) = json_request(
        router,
        "POST",
        "/v1/auth/login",
        Some(serde_json::json!({ "username": username, "password": password })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body
}

/// Register + login, returning the bearer token.
#[allow(dead_code)]
pub async fn register_and_login(router: &axum::Router, username: &str, password: &str) -> String {
    register(router, username, password).await;
    let body = login(router, username, password).await;
    body["access_token"].as_str().unwrap().to_string()
}

#[allow(dead_code)]
pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[allow(dead_code)]
pub fn b64_decode(value: &Value) -> Vec<u8> {
    STANDARD.decode(value.as_str().unwrap()).unwrap()
}
