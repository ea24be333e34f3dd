//! Bearer token surface tests: algorithm pinning, signature, expiry leeway
//! and subject format.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request, register_and_login};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
}

fn sign(claims: &TestClaims, key: &str, alg: Algorithm) -> String {
    encode(
        &Header::new(alg),
        claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .unwrap()
}

fn claims(sub: String, iat_offset: i64, exp_offset: i64, nbf_offset: Option<i64>) -> TestClaims {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    TestClaims {
        sub,
        iat: now + iat_offset,
        exp: now + exp_offset,
        nbf: nbf_offset.map(|o| now + o),
    }
}

async fn changes_status(server: &TestServer, token: &str) -> StatusCode {
    let (status, _) = json_request(
        &server.router,
        "GET",
        "/v1/items/changes?since_ver=0",
        None,
        Some(token),
    )
    .await;
    status
}

#[tokio::test]
async fn issued_token_is_accepted() {
    let server = TestServer::new().await;
    let token = register_and_login(&server.router, "alice", "qwe123").await;
    assert_eq!(changes_status(&server, &token).await, StatusCode::OK);
}

#[tokio::test]
async fn token_signed_with_another_key_is_rejected() {
    let server = TestServer::new().await;
    let token = sign(
        &claims(Uuid::new_v4().to_string(), 0, 900, None),
        "some-other-key",
        Algorithm::HS256,
    );
    assert_eq!(
        changes_status(&server, &token).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn non_hs256_algorithm_is_rejected() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    let token = sign(
        &claims(Uuid::new_v4().to_string(), 0, 900, None),
        &key,
        Algorithm::HS384,
    );
    assert_eq!(
        changes_status(&server, &token).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn expiry_beyond_leeway_is_rejected() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    let token = sign(
        &claims(Uuid::new_v4().to_string(), -900, -60, None),
        &key,
        Algorithm::HS256,
    );
    assert_eq!(
        changes_status(&server, &token).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn expiry_within_leeway_is_accepted() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    let token = sign(
        &claims(Uuid::new_v4().to_string(), -900, -10, None),
        &key,
        Algorithm::HS256,
    );
    assert_eq!(changes_status(&server, &token).await, StatusCode::OK);
}

#[tokio::test]
async fn nbf_within_leeway_is_accepted() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    // nbf one second in the past and, separately, slightly in the future
    // but inside the 30-second leeway.
    for nbf_offset in [-1, 10] {
        let token = sign(
            &claims(Uuid::new_v4().to_string(), 0, 900, Some(nbf_offset)),
            &key,
            Algorithm::HS256,
        );
        assert_eq!(
            changes_status(&server, &token).await,
            StatusCode::OK,
            "nbf offset {nbf_offset}"
        );
    }
}

#[tokio::test]
async fn nbf_beyond_leeway_is_rejected() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    let token = sign(
        &claims(Uuid::new_v4().to_string(), 0, 900, Some(120)),
        &key,
        Algorithm::HS256,
    );
    assert_eq!(
        changes_status(&server, &token).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn non_uuid_subject_is_rejected() {
    let server = TestServer::new().await;
    let key = server.state.config.auth.sign_key.clone();
    let token = sign(
        &claims("not-a-uuid".to_string(), 0, 900, None),
        &key,
        Algorithm::HS256,
    );
    assert_eq!(
        changes_status(&server, &token).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let server = TestServer::new().await;
    assert_eq!(
        changes_status(&server, "not.a.jwt").await,
        StatusCode::UNAUTHORIZED
    );
}
