//! Vault store: versioned encrypted items, users and the login limiter.
//!
//! The [`VaultStore`] trait is the seam services program against; it is the
//! union of the narrow repository capabilities plus migration and health
//! checks. Two implementations are provided:
//!
//! - [`PostgresStore`] — canonical production backend. Mutating item
//!   operations serialize concurrent writers per item with
//!   `SELECT … FOR UPDATE`; the limiter failure path is a single atomic
//!   upsert with `RETURNING`.
//! - [`SqliteStore`] — for tests and single-node deployments. The pool is
//!   pinned to one connection, so transactions serialize writers without
//!   row locks.

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use postgres::PostgresStore;
pub use repos::limiter::{FailureOutcome, LimiterParams, LoginGate, LoginLimiter, hash_ip};
pub use repos::{ItemRepo, UserRepo};
pub use store::{SqliteStore, VaultStore};

use gophkeeper_core::config::DatabaseConfig;
use std::sync::Arc;

/// Build a vault store from configuration.
pub async fn from_config(
    config: &DatabaseConfig,
    limiter: LimiterParams,
) -> StoreResult<Arc<dyn VaultStore>> {
    match config {
        DatabaseConfig::Sqlite { path } => {
            Ok(Arc::new(SqliteStore::new(path, limiter).await?))
        }
        DatabaseConfig::Postgres {
            url,
            max_connections,
            statement_timeout_ms,
        } => Ok(Arc::new(
            PostgresStore::from_url(url, *max_connections, *statement_timeout_ms, limiter).await?,
        )),
    }
}
