//! Crypto error types.

use thiserror::Error;

/// Errors from hashing, key derivation and AEAD operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// OS random source failure.
    #[error("random source failure: {0}")]
    Rng(String),

    /// Argon2 or HKDF rejected its inputs.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD seal failure (plaintext too large for the cipher).
    #[error("encryption failed")]
    Encrypt,

    /// Ciphertext is structurally invalid (e.g., shorter than nonce + tag).
    #[error("ciphertext corrupt")]
    Corrupt,

    /// Authentication tag did not verify; wrong key or mismatched
    /// associated data. Deliberately carries no detail.
    #[error("authentication failed")]
    Auth,
}

/// Result type for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
