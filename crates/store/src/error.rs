//! Vault store error types.
//!
//! These are the stable kinds services and the API layer match on; raw
//! database errors never cross the store boundary except wrapped in
//! [`StoreError::Database`], which the API layer maps to `internal`.

use thiserror::Error;

/// Vault store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// Optimistic concurrency failure: the submitted base version does not
    /// match the stored one, or a one-shot write found its slot taken.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// Unique constraint violation (e.g., username taken).
    #[error("already exists")]
    AlreadyExists,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Check whether a sqlx error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
