//! JSON wire types for the vault API.
//!
//! Byte fields travel as standard base64; identifiers as canonical
//! hyphenated UUID strings; timestamps as RFC 3339.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Serde helpers for base64-encoded byte fields.
pub mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(&text).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional base64-encoded byte fields.
pub mod b64_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text = Option::<String>::deserialize(d)?;
        text.map(|t| STANDARD.decode(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response with bootstrap material for client-side key derivation.
///
/// `wrapped_dek` is empty on the first login from any device; the client is
/// expected to generate a DEK, wrap it under the password-derived KEK and
/// persist it once via `SetWrappedDek`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Always empty; refresh token rotation is not implemented.
    #[serde(default)]
    pub refresh_token: String,
    pub user_id: Uuid,
    #[serde(with = "b64")]
    pub kek_salt: Vec<u8>,
    #[serde(with = "b64")]
    pub wrapped_dek: Vec<u8>,
    /// Access token expiry, for diagnostics only.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWrappedDekRequest {
    #[serde(with = "b64")]
    pub wrapped_dek: Vec<u8>,
}

// =============================================================================
// Items
// =============================================================================

/// One client change intent with its optimistic concurrency base version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertItemDto {
    pub id: Uuid,
    pub base_ver: i64,
    #[serde(with = "b64")]
    pub blob_enc: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertItemsRequest {
    pub items: Vec<UpsertItemDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVersionDto {
    pub id: Uuid,
    pub new_ver: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertItemsResponse {
    pub results: Vec<ItemVersionDto>,
}

/// A single delta-sync record. `blob_enc` is omitted for tombstones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDto {
    pub id: Uuid,
    pub ver: i64,
    pub deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(
        with = "b64_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub blob_enc: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChangesResponse {
    pub changes: Vec<ChangeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub ver: i64,
    pub deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "b64")]
    pub blob_enc: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteItemResponse {
    pub result: ItemVersionDto,
}
