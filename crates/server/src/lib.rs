//! HTTP API server for the GophKeeper vault.
//!
//! This crate wires the control plane together:
//! - registration, login and wrapped-DEK bootstrap
//! - batch item upsert with optimistic concurrency
//! - delta sync (`changes since`) with tombstones
//! - bearer authentication, request logging, panic recovery

pub mod auth;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod service;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
