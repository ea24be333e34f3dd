//! Registration, login and wrapped-DEK bootstrap handlers.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::{client_ip, read_json};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use gophkeeper_core::api::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SetWrappedDekRequest,
};

/// GET /v1/health - liveness probe, intentionally unauthenticated.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.store.health_check().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// POST /v1/auth/register - create a new user account.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let body: RegisterRequest = read_json(&state, req).await?;
    let user_id = state.auth.register(&body.username, &body.password).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

/// POST /v1/auth/login - authenticate and return tokens plus the bootstrap
/// material (`kek_salt`, `wrapped_dek`) the client needs to derive keys.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<LoginResponse>> {
    let ip = client_ip(&req, &state);
    let body: LoginRequest = read_json(&state, req).await?;

    let (tokens, user) = state
        .auth
        .login_with_ip(&body.username, &body.password, &ip)
        .await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: String::new(),
        user_id: user.id,
        kek_salt: user.kek_salt,
        wrapped_dek: user.wrapped_dek,
        expires_at: tokens.expires_at,
    }))
}

/// POST /v1/auth/wrapped-dek - one-shot persistence of the client's wrapped
/// DEK. A second attempt conflicts.
#[tracing::instrument(skip_all)]
pub async fn set_wrapped_dek(State(state): State<AppState>, req: Request) -> ApiResult<StatusCode> {
    let auth = require_auth(&req)?;
    let body: SetWrappedDekRequest = read_json(&state, req).await?;
    state
        .auth
        .set_wrapped_dek(auth.user_id, &body.wrapped_dek)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
