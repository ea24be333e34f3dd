//! Authentication service: registration, login with rate limiting, token
//! issuance and wrapped-DEK bootstrap.

use crate::error::{ApiError, ApiResult};
use gophkeeper_crypto::passhash;
use gophkeeper_store::models::UserRow;
use gophkeeper_store::{StoreError, VaultStore, hash_ip};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Clock skew tolerance for token validation, in seconds.
const TOKEN_LEEWAY_SECS: u64 = 30;

/// Salt hashed against when the user does not exist, so the missing-user
/// path costs the same as a wrong-password path.
const DUMMY_SALT: [u8; passhash::SALT_LEN] = [0u8; passhash::SALT_LEN];

/// Issued access/refresh tokens (refresh not implemented, always empty on
/// the wire).
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access_token: String,
    /// Access token expiry, for diagnostics.
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Authentication and bootstrap operations.
pub struct AuthService {
    store: Arc<dyn VaultStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl AuthService {
    /// Construct the service. The signing key is read-only after startup.
    pub fn new(store: Arc<dyn VaultStore>, sign_key: &[u8], access_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = TOKEN_LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            store,
            encoding_key: EncodingKey::from_secret(sign_key),
            decoding_key: DecodingKey::from_secret(sign_key),
            validation,
            access_ttl,
        }
    }

    /// Create a new user with per-user salts and an Argon2id password hash.
    pub async fn register(&self, username: &str, password: &str) -> ApiResult<Uuid> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "empty username or password".to_string(),
            ));
        }

        let user_id = Uuid::new_v4();
        let salt_auth = passhash::random_bytes(passhash::SALT_LEN)?;
        let kek_salt = passhash::random_bytes(passhash::SALT_LEN)?;

        // Argon2id is CPU-bound for tens of milliseconds; keep it off the
        // async workers.
        let password_bytes = password.as_bytes().to_vec();
        let salt = salt_auth.clone();
        let pwd_hash = tokio::task::spawn_blocking(move || {
            passhash::hash_password(&password_bytes, &salt)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("hash task failed: {e}")))??;

        let user = UserRow {
            id: user_id,
            username: username.to_string(),
            pwd_hash: pwd_hash.to_vec(),
            salt_auth,
            kek_salt,
            wrapped_dek: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.create_user(&user).await?;

        Ok(user_id)
    }

    /// Authenticate with rate limiting keyed by `(username, ip)`.
    ///
    /// The missing-user and wrong-password paths are indistinguishable to
    /// the caller in both error kind and timing.
    pub async fn login_with_ip(
        &self,
        username: &str,
        password: &str,
        ip: &str,
    ) -> ApiResult<(Tokens, UserRow)> {
        let ip_hash = hash_ip(ip);

        let gate = self.store.allow(username, &ip_hash).await?;
        if !gate.allowed {
            return Err(ApiError::RateLimited {
                retry_after: gate.retry_after,
            });
        }

        let user = match self.store.get_user_by_username(username).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let password_bytes = password.as_bytes().to_vec();
        let (user, verified) = tokio::task::spawn_blocking(move || match user {
            Some(user) => {
                let ok = passhash::verify_password(&password_bytes, &user.salt_auth, &user.pwd_hash);
                (Some(user), ok)
            }
            None => {
                // Burn the same Argon2id work as a real verification.
                let _ = passhash::hash_password(&password_bytes, &DUMMY_SALT);
                (None, false)
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("verify task failed: {e}")))?;

        if !verified {
            return match self.store.record_failure(username, &ip_hash).await {
                Ok(outcome) if outcome.blocked_now => Err(ApiError::RateLimited {
                    retry_after: outcome.retry_after,
                }),
                Ok(_) => Err(ApiError::Unauthorized("bad credentials".to_string())),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to record login failure");
                    Err(ApiError::Unauthorized("bad credentials".to_string()))
                }
            };
        }

        let user = user.ok_or_else(|| ApiError::Internal("verified without user".to_string()))?;

        // Best-effort counter reset; a failure here leaves counters stale
        // until the window elapses.
        if let Err(e) = self.store.record_success(username, &ip_hash).await {
            tracing::warn!(error = %e, "failed to reset login limiter");
        }

        let tokens = self.issue_access_token(user.id)?;
        Ok((tokens, user))
    }

    /// Persist the client's wrapped DEK if none is set yet.
    pub async fn set_wrapped_dek(&self, user_id: Uuid, wrapped: &[u8]) -> ApiResult<()> {
        if user_id.is_nil() || wrapped.is_empty() {
            return Err(ApiError::Validation(
                "empty user id or wrapped_dek".to_string(),
            ));
        }
        self.store.set_wrapped_dek_if_empty(user_id, wrapped).await?;
        Ok(())
    }

    /// Mint a signed HS256 access token for the given subject.
    pub fn issue_access_token(&self, user_id: Uuid) -> ApiResult<Tokens> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.access_ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

        Ok(Tokens {
            access_token,
            expires_at,
        })
    }

    /// Validate a bearer token and return the caller's user id.
    ///
    /// Rejects any signing algorithm other than HS256, bad signatures, and
    /// `exp`/`nbf` outside the 30-second leeway.
    pub fn authenticate(&self, token: &str) -> ApiResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| ApiError::Unauthorized("invalid token".to_string()))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ApiError::Unauthorized("invalid token subject".to_string()))
    }
}
