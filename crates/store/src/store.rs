//! Vault store trait and the SQLite implementation.

use crate::error::{StoreError, StoreResult};
use crate::repos::limiter::{LimiterParams, LoginLimiter};
use crate::repos::{ItemRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite schema (embedded).
const SQLITE_SCHEMA: &str = include_str!("sqlite_schema.sql");

/// Combined vault store trait.
#[async_trait]
pub trait VaultStore: ItemRepo + UserRepo + LoginLimiter + Send + Sync {
    /// Apply the embedded schema.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;
}

/// SQLite-based vault store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    limiter: LimiterParams,
}

impl SqliteStore {
    /// Create a new SQLite store and apply migrations.
    pub async fn new(path: impl AsRef<Path>, limiter: LimiterParams) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Internal(format!("create database dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // serializes transactions, which also stands in for the
            // `SELECT ... FOR UPDATE` row locks the PostgreSQL store takes.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool, limiter };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl VaultStore for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SQLITE_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::error::is_unique_violation;
    use crate::models::{Change, ItemRow, ItemVersion, UpsertIntent, UserRow};
    use crate::repos::limiter::{FailureOutcome, LoginGate};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl ItemRepo for SqliteStore {
        async fn upsert_batch(
            &self,
            user_id: Uuid,
            intents: &[UpsertIntent],
        ) -> StoreResult<Vec<ItemVersion>> {
            // A failed intent returns early; the dropped transaction rolls
            // back, keeping the batch all-or-nothing.
            let mut tx = self.pool.begin().await?;
            let now = OffsetDateTime::now_utc();
            let mut results = Vec::with_capacity(intents.len());

            for (i, intent) in intents.iter().enumerate() {
                let current: Option<i64> =
                    sqlx::query_scalar("SELECT ver FROM items WHERE id = ? AND user_id = ?")
                        .bind(intent.id)
                        .bind(user_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                let new_ver = match current {
                    Some(cur) => {
                        if intent.base_ver != cur {
                            return Err(StoreError::VersionConflict(format!(
                                "item[{i}]: base_ver {} does not match current {cur}",
                                intent.base_ver
                            )));
                        }
                        let new_ver = cur + 1;
                        sqlx::query(
                            "UPDATE items SET blob_enc = ?, ver = ?, deleted = 0, updated_at = ? \
                             WHERE id = ? AND user_id = ?",
                        )
                        .bind(&intent.blob_enc)
                        .bind(new_ver)
                        .bind(now)
                        .bind(intent.id)
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await?;
                        new_ver
                    }
                    None => {
                        if intent.base_ver != 0 {
                            return Err(StoreError::VersionConflict(format!(
                                "item[{i}]: base_ver {} for an item that does not exist",
                                intent.base_ver
                            )));
                        }
                        sqlx::query(
                            "INSERT INTO items (id, user_id, blob_enc, ver, deleted, updated_at) \
                             VALUES (?, ?, ?, 1, 0, ?)",
                        )
                        .bind(intent.id)
                        .bind(user_id)
                        .bind(&intent.blob_enc)
                        .bind(now)
                        .execute(&mut *tx)
                        .await?;
                        1
                    }
                };

                results.push(ItemVersion {
                    id: intent.id,
                    new_ver,
                    updated_at: now,
                });
            }

            tx.commit().await?;
            Ok(results)
        }

        async fn delete_item(
            &self,
            user_id: Uuid,
            item_id: Uuid,
            base_ver: i64,
        ) -> StoreResult<ItemVersion> {
            let mut tx = self.pool.begin().await?;
            let now = OffsetDateTime::now_utc();

            let current: Option<i64> =
                sqlx::query_scalar("SELECT ver FROM items WHERE id = ? AND user_id = ?")
                    .bind(item_id)
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let cur = current.ok_or(StoreError::NotFound)?;
            if cur != base_ver {
                return Err(StoreError::VersionConflict(format!(
                    "base_ver {base_ver} does not match current {cur}"
                )));
            }

            let new_ver = cur + 1;
            // Payload stays in place: clients that have not observed the
            // deletion can still fetch the last ciphertext.
            sqlx::query(
                "UPDATE items SET deleted = 1, ver = ?, updated_at = ? \
                 WHERE id = ? AND user_id = ?",
            )
            .bind(new_ver)
            .bind(now)
            .bind(item_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(ItemVersion {
                id: item_id,
                new_ver,
                updated_at: now,
            })
        }

        async fn get_changes_since(
            &self,
            user_id: Uuid,
            since_ver: i64,
        ) -> StoreResult<Vec<Change>> {
            let rows = sqlx::query_as::<_, Change>(
                "SELECT id, ver, deleted, updated_at, \
                        CASE WHEN deleted THEN NULL ELSE blob_enc END AS blob_enc \
                 FROM items WHERE user_id = ? AND ver > ? ORDER BY ver ASC",
            )
            .bind(user_id)
            .bind(since_ver)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_item(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<ItemRow> {
            sqlx::query_as::<_, ItemRow>(
                "SELECT id, user_id, blob_enc, ver, deleted, updated_at \
                 FROM items WHERE user_id = ? AND id = ?",
            )
            .bind(user_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
        }

        async fn get_max_version(&self, user_id: Uuid) -> StoreResult<i64> {
            let max: i64 =
                sqlx::query_scalar("SELECT COALESCE(MAX(ver), 0) FROM items WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(max)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> StoreResult<()> {
            sqlx::query(
                "INSERT INTO users (id, username, pwd_hash, salt_auth, kek_salt, wrapped_dek, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.pwd_hash)
            .bind(&user.salt_auth)
            .bind(&user.kek_salt)
            .bind(&user.wrapped_dek)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyExists
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_user_by_id(&self, id: Uuid) -> StoreResult<UserRow> {
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        }

        async fn get_user_by_username(&self, username: &str) -> StoreResult<UserRow> {
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        }

        async fn set_wrapped_dek_if_empty(&self, id: Uuid, wrapped: &[u8]) -> StoreResult<()> {
            let result = sqlx::query(
                "UPDATE users SET wrapped_dek = ? WHERE id = ? AND length(wrapped_dek) = 0",
            )
            .bind(wrapped)
            .bind(id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::VersionConflict(
                    "wrapped_dek already initialized".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LoginLimiter for SqliteStore {
        async fn allow(&self, username: &str, ip_hash: &[u8]) -> StoreResult<LoginGate> {
            let blocked_until: Option<OffsetDateTime> = sqlx::query_scalar(
                "SELECT blocked_until FROM auth_limiter WHERE username = ? AND ip_hash = ?",
            )
            .bind(username)
            .bind(ip_hash)
            .fetch_optional(&self.pool)
            .await?;

            let now = OffsetDateTime::now_utc();
            match blocked_until {
                Some(until) if until > now => Ok(LoginGate {
                    allowed: false,
                    retry_after: until - now,
                }),
                _ => Ok(LoginGate {
                    allowed: true,
                    retry_after: time::Duration::ZERO,
                }),
            }
        }

        async fn record_success(&self, username: &str, ip_hash: &[u8]) -> StoreResult<()> {
            sqlx::query(
                "INSERT INTO auth_limiter (username, ip_hash, fail_count, blocked_until, updated_at) \
                 VALUES (?, ?, 0, ?, ?) \
                 ON CONFLICT (username, ip_hash) DO UPDATE \
                 SET fail_count = 0, blocked_until = excluded.blocked_until, \
                     updated_at = excluded.updated_at",
            )
            .bind(username)
            .bind(ip_hash)
            .bind(OffsetDateTime::UNIX_EPOCH)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn record_failure(
            &self,
            username: &str,
            ip_hash: &[u8],
        ) -> StoreResult<FailureOutcome> {
            // The single-connection pool serializes this read-modify-write;
            // the PostgreSQL store does it in one upserting statement.
            let mut tx = self.pool.begin().await?;
            let now = OffsetDateTime::now_utc();

            let previous: Option<(i64, OffsetDateTime)> = sqlx::query_as(
                "SELECT fail_count, updated_at FROM auth_limiter \
                 WHERE username = ? AND ip_hash = ?",
            )
            .bind(username)
            .bind(ip_hash)
            .fetch_optional(&mut *tx)
            .await?;

            let fails = match previous {
                Some((prev, updated_at)) if now - updated_at <= self.limiter.window => prev + 1,
                _ => 1,
            };

            sqlx::query(
                "INSERT INTO auth_limiter (username, ip_hash, fail_count, blocked_until, updated_at) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (username, ip_hash) DO UPDATE \
                 SET fail_count = excluded.fail_count, updated_at = excluded.updated_at",
            )
            .bind(username)
            .bind(ip_hash)
            .bind(fails)
            .bind(OffsetDateTime::UNIX_EPOCH)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let outcome = if fails >= self.limiter.max_fails {
                sqlx::query(
                    "UPDATE auth_limiter SET blocked_until = ? WHERE username = ? AND ip_hash = ?",
                )
                .bind(now + self.limiter.block_for)
                .bind(username)
                .bind(ip_hash)
                .execute(&mut *tx)
                .await?;
                FailureOutcome {
                    blocked_now: true,
                    retry_after: self.limiter.block_for,
                }
            } else {
                FailureOutcome {
                    blocked_now: false,
                    retry_after: time::Duration::ZERO,
                }
            };

            tx.commit().await?;
            Ok(outcome)
        }
    }
}
