//! Database models mapping to the vault schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Server-side user record. Key material is opaque: `pwd_hash` is an
/// Argon2id digest, `wrapped_dek` a client-produced AEAD blob (empty until
/// the first successful bootstrap).
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub pwd_hash: Vec<u8>,
    pub salt_auth: Vec<u8>,
    pub kek_salt: Vec<u8>,
    pub wrapped_dek: Vec<u8>,
    pub created_at: OffsetDateTime,
}

/// A stored record: opaque ciphertext plus versioning metadata. A tombstone
/// is a normal row with `deleted = true` and an incremented `ver`.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blob_enc: Vec<u8>,
    pub ver: i64,
    pub deleted: bool,
    pub updated_at: OffsetDateTime,
}

/// Client change intent with its optimistic concurrency base version.
/// `base_ver = 0` means "create".
#[derive(Debug, Clone)]
pub struct UpsertIntent {
    pub id: Uuid,
    pub base_ver: i64,
    pub blob_enc: Vec<u8>,
}

/// The new version assigned by a successful mutation.
#[derive(Debug, Clone)]
pub struct ItemVersion {
    pub id: Uuid,
    pub new_ver: i64,
    pub updated_at: OffsetDateTime,
}

/// One delta-sync record. `blob_enc` is `None` for tombstoned rows.
#[derive(Debug, Clone, FromRow)]
pub struct Change {
    pub id: Uuid,
    pub ver: i64,
    pub deleted: bool,
    pub updated_at: OffsetDateTime,
    pub blob_enc: Option<Vec<u8>>,
}
