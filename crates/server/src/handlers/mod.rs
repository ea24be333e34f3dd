//! Request handlers.

pub mod auth;
pub mod items;

pub use auth::{health_check, login, register, set_wrapped_dek};
pub use items::{delete_item, get_changes, get_item, upsert_items};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;

/// Read and deserialize a JSON body, enforcing the configured payload cap.
pub(crate) async fn read_json<T: DeserializeOwned>(state: &AppState, req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), state.config.server.max_body_bytes)
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Validation(format!("invalid JSON: {e}")))
}

/// Client IP for the login limiter.
///
/// The forwarded header is only honored when the deployment opted in;
/// otherwise the direct connection address is used.
pub(crate) fn client_ip(req: &Request, state: &AppState) -> String {
    if state.config.server.trust_forwarded_for
        && let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
    {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
