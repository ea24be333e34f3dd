//! Integration tests for the HTTP API: account bootstrap, the item
//! create/edit/delete cycle and delta sync.

mod common;

use axum::http::StatusCode;
use common::{TestServer, b64, b64_decode, json_request, login, register, register_and_login};
use gophkeeper_core::config::AppConfig;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_endpoint_is_open() {
    let server = TestServer::new().await;
    let (status, body) = json_request(&server.router, "GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_rejects_empty_input() {
    let server = TestServer::new().await;
    for payload in [
        json!({ "username": "", "password": "qwe123" }),
        json!({ "username": "alice", "password": "" }),
    ] {
        let (status, body) =
            json_request(&server.router, "POST", "/v1/auth/register", Some(payload), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");
    }
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let server = TestServer::new().await;
    register(&server.router, "alice", "qwe123").await;

    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/auth/register",
        Some(json!({ "username": "alice", "password": "other" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");
}

#[tokio::test]
async fn register_login_bootstrap_cycle() {
    let server = TestServer::new().await;
    let user_id = register(&server.router, "alice", "qwe123").await;

    // First login: non-empty kek_salt, empty wrapped_dek.
    let body = login(&server.router, "alice", "qwe123").await;
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["refresh_token"], "");
    assert_eq!(b64_decode(&body["kek_salt"]).len(), 16);
    assert!(b64_decode(&body["wrapped_dek"]).is_empty());

    let token = body["access_token"].as_str().unwrap().to_string();

    // Client wraps its DEK and persists it once.
    let wrapped = b"pretend-wrapped-dek".to_vec();
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/v1/auth/wrapped-dek",
        Some(json!({ "wrapped_dek": b64(&wrapped) })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Subsequent logins return the stored wrapped DEK.
    let body = login(&server.router, "alice", "qwe123").await;
    assert_eq!(b64_decode(&body["wrapped_dek"]), wrapped);

    // The bootstrap slot is one-shot.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/auth/wrapped-dek",
        Some(json!({ "wrapped_dek": b64(b"anything") })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "version_conflict");
}

#[tokio::test]
async fn wrapped_dek_rejects_empty_payload() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/auth/wrapped-dek",
        Some(json!({ "wrapped_dek": "" })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn items_require_authentication() {
    let server = TestServer::new().await;
    for (method, uri) in [
        ("POST", "/v1/items"),
        ("GET", "/v1/items/changes"),
        (
            "GET",
            "/v1/items/7e6ad803-5b4b-4a7c-9b8a-1c87d3c1e000",
        ),
        (
            "DELETE",
            "/v1/items/7e6ad803-5b4b-4a7c-9b8a-1c87d3c1e000?base_ver=1",
        ),
    ] {
        let (status, body) =
            json_request(&server.router, method, uri, Some(json!({"items": []})), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}: {body}");
        assert_eq!(body["code"], "unauthorized");
    }
}

#[tokio::test]
async fn create_edit_stale_delete_cycle() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;
    let item_id = Uuid::new_v4();

    // Create at base_ver 0 -> ver 1.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [{ "id": item_id, "base_ver": 0, "blob_enc": b64(b"E1") }] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["results"][0]["new_ver"], 1);

    // Edit at base_ver 1 -> ver 2.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [{ "id": item_id, "base_ver": 1, "blob_enc": b64(b"E2") }] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["results"][0]["new_ver"], 2);

    // Stale write at base_ver 1 -> conflict.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [{ "id": item_id, "base_ver": 1, "blob_enc": b64(b"E3") }] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "version_conflict");
    assert!(body["message"].as_str().unwrap().contains("item[0]"));

    // Delete at base_ver 2 -> ver 3.
    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/items/{item_id}?base_ver=2"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["new_ver"], 3);

    // The tombstone stays addressable and keeps the last ciphertext.
    let (status, body) = json_request(
        &server.router,
        "GET",
        &format!("/v1/items/{item_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ver"], 3);
    assert_eq!(body["deleted"], true);
    assert_eq!(b64_decode(&body["blob_enc"]), b"E2");
}

#[tokio::test]
async fn delta_sync_returns_ascending_changes_without_tombstone_payload() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;
    let item_id = Uuid::new_v4();

    for (base, blob) in [(0, b"E1"), (1, b"E2")] {
        let (status, _) = json_request(
            &server.router,
            "POST",
            "/v1/items",
            Some(json!({ "items": [{ "id": item_id, "base_ver": base, "blob_enc": b64(blob) }] })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/items/{item_id}?base_ver=2"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/v1/items/changes?since_ver=0",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let changes = body["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 3);
    for (i, expected_ver) in [1, 2, 3].iter().enumerate() {
        assert_eq!(changes[i]["id"].as_str().unwrap(), item_id.to_string());
        assert_eq!(changes[i]["ver"], *expected_ver);
    }
    assert_eq!(changes[2]["deleted"], true);
    assert!(changes[2].get("blob_enc").is_none());

    // Watermark skips already-seen versions.
    let (status, body) = json_request(
        &server.router,
        "GET",
        "/v1/items/changes?since_ver=2",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"].as_array().unwrap().len(), 1);
    assert_eq!(body["changes"][0]["ver"], 3);
}

#[tokio::test]
async fn multi_item_batch_commits_atomically() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [
            { "id": a, "base_ver": 0, "blob_enc": b64(b"A1") },
            { "id": b, "base_ver": 0, "blob_enc": b64(b"B1") },
        ] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    // One stale intent poisons the whole batch.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [
            { "id": a, "base_ver": 1, "blob_enc": b64(b"A2") },
            { "id": b, "base_ver": 0, "blob_enc": b64(b"B2") },
        ] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("item[1]"));

    // Item a was not bumped by the failed batch.
    let (_, body) = json_request(
        &server.router,
        "GET",
        &format!("/v1/items/{a}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(body["ver"], 1);
}

#[tokio::test]
async fn empty_batch_returns_empty_results() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let mut config = AppConfig::for_testing();
    config.server.max_batch = 2;
    let server = TestServer::with_config(config).await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    let items: Vec<_> = (0..3)
        .map(|_| json!({ "id": Uuid::new_v4(), "base_ver": 0, "blob_enc": b64(b"x") }))
        .collect();
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": items })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn invalid_intent_fields_are_rejected() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    for items in [
        json!([{ "id": Uuid::nil(), "base_ver": 0, "blob_enc": b64(b"x") }]),
        json!([{ "id": Uuid::new_v4(), "base_ver": -1, "blob_enc": b64(b"x") }]),
        json!([{ "id": Uuid::new_v4(), "base_ver": 0, "blob_enc": "" }]),
    ] {
        let (status, body) = json_request(
            &server.router,
            "POST",
            "/v1/items",
            Some(json!({ "items": items })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["code"], "validation");
    }
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        &format!("/v1/items/{}", Uuid::new_v4()),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/items/{}?base_ver=0", Uuid::new_v4()),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
}

#[tokio::test]
async fn items_are_isolated_between_users() {
    let server = TestServer::new().await;
    let alice = register_and_login(&server.router, "alice", "qwe123").await;
    let bob = register_and_login(&server.router, "bob", "asd456").await;
    let item_id = Uuid::new_v4();

    let (status, _) = json_request(
        &server.router,
        "POST",
        "/v1/items",
        Some(json!({ "items": [{ "id": item_id, "base_ver": 0, "blob_enc": b64(b"secret") }] })),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/v1/items/{item_id}"),
        None,
        Some(&bob),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = json_request(
        &server.router,
        "GET",
        "/v1/items/changes?since_ver=0",
        None,
        Some(&bob),
    )
    .await;
    assert_eq!(body["changes"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/items")
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
