//! PostgreSQL-based vault store implementation.
//!
//! Mutating item operations take `SELECT ... FOR UPDATE` row locks inside
//! explicit transactions, serializing concurrent writers per `(item, user)`.
//! The limiter failure path is a single atomic upsert with `RETURNING`, so
//! the counter never needs an advisory lock.

use crate::error::{StoreError, StoreResult, is_unique_violation};
use crate::models::{Change, ItemRow, ItemVersion, UpsertIntent, UserRow};
use crate::repos::limiter::{FailureOutcome, LimiterParams, LoginGate, LoginLimiter};
use crate::repos::{ItemRepo, UserRepo};
use crate::store::VaultStore;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// PostgreSQL-based vault store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    limiter: LimiterParams,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL and apply
    /// migrations.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        limiter: LimiterParams,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::from_str(url)?;

        // Server-side statement timeout aborts hung queries instead of
        // tying up pool connections.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!("PostgreSQL statement_timeout set to {timeout_ms}ms");
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool, limiter };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl VaultStore for PostgresStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(POSTGRES_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ItemRepo for PostgresStore {
    async fn upsert_batch(
        &self,
        user_id: Uuid,
        intents: &[UpsertIntent],
    ) -> StoreResult<Vec<ItemVersion>> {
        // A failed intent returns early; the dropped transaction rolls
        // back, keeping the batch all-or-nothing.
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(intents.len());

        for (i, intent) in intents.iter().enumerate() {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT ver FROM items WHERE id = $1 AND user_id = $2 FOR UPDATE",
            )
            .bind(intent.id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            let (new_ver, updated_at) = match current {
                Some(cur) => {
                    if intent.base_ver != cur {
                        return Err(StoreError::VersionConflict(format!(
                            "item[{i}]: base_ver {} does not match current {cur}",
                            intent.base_ver
                        )));
                    }
                    let new_ver = cur + 1;
                    // updated_at is maintained by the items trigger.
                    let updated_at: OffsetDateTime = sqlx::query_scalar(
                        "UPDATE items SET blob_enc = $3, ver = $4, deleted = false \
                         WHERE id = $1 AND user_id = $2 RETURNING updated_at",
                    )
                    .bind(intent.id)
                    .bind(user_id)
                    .bind(&intent.blob_enc)
                    .bind(new_ver)
                    .fetch_one(&mut *tx)
                    .await?;
                    (new_ver, updated_at)
                }
                None => {
                    if intent.base_ver != 0 {
                        return Err(StoreError::VersionConflict(format!(
                            "item[{i}]: base_ver {} for an item that does not exist",
                            intent.base_ver
                        )));
                    }
                    let updated_at: OffsetDateTime = sqlx::query_scalar(
                        "INSERT INTO items (id, user_id, blob_enc, ver, deleted) \
                         VALUES ($1, $2, $3, 1, false) RETURNING updated_at",
                    )
                    .bind(intent.id)
                    .bind(user_id)
                    .bind(&intent.blob_enc)
                    .fetch_one(&mut *tx)
                    .await?;
                    (1, updated_at)
                }
            };

            results.push(ItemVersion {
                id: intent.id,
                new_ver,
                updated_at,
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

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT ver FROM items WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
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
        let updated_at: OffsetDateTime = sqlx::query_scalar(
            "UPDATE items SET deleted = true, ver = $3 \
             WHERE id = $1 AND user_id = $2 RETURNING updated_at",
        )
        .bind(item_id)
        .bind(user_id)
        .bind(new_ver)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ItemVersion {
            id: item_id,
            new_ver,
            updated_at,
        })
    }

    async fn get_changes_since(&self, user_id: Uuid, since_ver: i64) -> StoreResult<Vec<Change>> {
        let rows = sqlx::query_as::<_, Change>(
            "SELECT id, ver, deleted, updated_at, \
                    CASE WHEN deleted THEN NULL ELSE blob_enc END AS blob_enc \
             FROM items WHERE user_id = $1 AND ver > $2 ORDER BY ver ASC",
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
             FROM items WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn get_max_version(&self, user_id: Uuid) -> StoreResult<i64> {
        let max: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(ver), 0) FROM items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }
}

#[async_trait]
impl UserRepo for PostgresStore {
    async fn create_user(&self, user: &UserRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, pwd_hash, salt_auth, kek_salt, wrapped_dek, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
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
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<UserRow> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn set_wrapped_dek_if_empty(&self, id: Uuid, wrapped: &[u8]) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET wrapped_dek = $2 \
             WHERE id = $1 AND octet_length(wrapped_dek) = 0",
        )
        .bind(id)
        .bind(wrapped)
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
impl LoginLimiter for PostgresStore {
    async fn allow(&self, username: &str, ip_hash: &[u8]) -> StoreResult<LoginGate> {
        let blocked_until: Option<OffsetDateTime> = sqlx::query_scalar(
            "SELECT blocked_until FROM auth_limiter WHERE username = $1 AND ip_hash = $2",
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
             VALUES ($1, $2, 0, 'epoch', $3) \
             ON CONFLICT (username, ip_hash) DO UPDATE \
             SET fail_count = 0, blocked_until = 'epoch', updated_at = EXCLUDED.updated_at",
        )
        .bind(username)
        .bind(ip_hash)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(&self, username: &str, ip_hash: &[u8]) -> StoreResult<FailureOutcome> {
        let now = OffsetDateTime::now_utc();

        // Counter increment and window rollover in one upserting statement;
        // concurrent failures for the same key serialize on the row.
        let fails: i64 = sqlx::query_scalar(
            "INSERT INTO auth_limiter (username, ip_hash, fail_count, blocked_until, updated_at) \
             VALUES ($1, $2, 1, 'epoch', $3) \
             ON CONFLICT (username, ip_hash) DO UPDATE \
             SET fail_count = CASE \
                     WHEN EXCLUDED.updated_at - auth_limiter.updated_at > $4::bigint * interval '1 second' \
                     THEN 1 \
                     ELSE auth_limiter.fail_count + 1 \
                 END, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING fail_count",
        )
        .bind(username)
        .bind(ip_hash)
        .bind(now)
        .bind(self.limiter.window.whole_seconds())
        .fetch_one(&self.pool)
        .await?;

        if fails >= self.limiter.max_fails {
            sqlx::query(
                "UPDATE auth_limiter SET blocked_until = $3 WHERE username = $1 AND ip_hash = $2",
            )
            .bind(username)
            .bind(ip_hash)
            .bind(now + self.limiter.block_for)
            .execute(&self.pool)
            .await?;
            return Ok(FailureOutcome {
                blocked_now: true,
                retry_after: self.limiter.block_for,
            });
        }

        Ok(FailureOutcome {
            blocked_now: false,
            retry_after: time::Duration::ZERO,
        })
    }
}
