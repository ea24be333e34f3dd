//! Common test utilities for store integration tests.

use gophkeeper_store::models::UserRow;
use gophkeeper_store::{LimiterParams, SqliteStore};
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// Create a SQLite store backed by a temp directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub async fn test_store() -> (TempDir, SqliteStore) {
    test_store_with_limiter(LimiterParams::default()).await
}

#[allow(dead_code)]
pub async fn test_store_with_limiter(limiter: LimiterParams) -> (TempDir, SqliteStore) {
    let temp = tempfile::tempdir().expect("failed to create temp directory");
    let db_path = temp.path().join("vault.db");
    let store = SqliteStore::new(&db_path, limiter)
        .await
        .expect("failed to create store");
    (temp, store)
}

/// A user row with dummy key material.
#[allow(dead_code)]
pub fn test_user(username: &str) -> UserRow {
    UserRow {
        id: Uuid::new_v4(),
        username: username.to_string(),
        pwd_hash: vec![1u8; 32],
        salt_auth: vec![2u8; 16],
        kek_salt: vec![3u8; 16],
        wrapped_dek: Vec::new(),
        created_at: OffsetDateTime::now_utc(),
    }
}
