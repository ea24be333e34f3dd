//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::logging::{handle_panic, request_log_middleware};
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check (intentionally unauthenticated for probes)
        .route("/v1/health", get(handlers::health_check))
        // Account lifecycle
        .route("/v1/auth/register", post(handlers::register))
        .route("/v1/auth/login", post(handlers::login))
        .route("/v1/auth/wrapped-dek", post(handlers::set_wrapped_dek))
        // Encrypted items
        .route("/v1/items", post(handlers::upsert_items))
        .route("/v1/items/changes", get(handlers::get_changes))
        .route(
            "/v1/items/{item_id}",
            get(handlers::get_item).delete(handlers::delete_item),
        );

    // Middleware layers are applied in reverse order (outermost last).
    // Order of execution: logging -> panic recovery -> auth -> handler.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(request_log_middleware))
        .with_state(state)
}
