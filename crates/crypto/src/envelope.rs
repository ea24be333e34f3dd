//! Client-side envelope encryption.
//!
//! Key hierarchy: the user password and per-user `kek_salt` derive a KEK;
//! the KEK wraps a random DEK; per-item keys come from the DEK via
//! HKDF-SHA-256 with the item id as context. Record payloads are sealed
//! with XChaCha20-Poly1305 and associated data binding the ciphertext to
//! `(user, item, version)`, so a ciphertext replayed under another user,
//! item or version fails authentication even with the right key.
//!
//! All layouts are `nonce(24) || ciphertext || tag(16)`. Nonces are drawn
//! uniformly at random per operation, never derived from counters or AAD.

use crate::error::{CryptoError, CryptoResult};
use crate::passhash;
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Data encryption key length in bytes.
pub const DEK_LEN: usize = 32;
/// Key encryption key length in bytes.
pub const KEK_LEN: usize = 32;
/// XChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_LEN: usize = 24;
/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

fn random_nonce() -> CryptoResult<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(nonce)
}

/// Generate a fresh random DEK. Called once per user, on first login.
pub fn generate_dek() -> CryptoResult<Zeroizing<Vec<u8>>> {
    Ok(Zeroizing::new(passhash::random_bytes(DEK_LEN)?))
}

/// Derive the KEK from the password and the per-user `kek_salt`.
///
/// Same Argon2id parameters as server-side password hashing; the two never
/// collide because `kek_salt` and `salt_auth` are independent random salts.
pub fn derive_kek(password: &[u8], kek_salt: &[u8]) -> CryptoResult<[u8; KEK_LEN]> {
    passhash::hash_password(password, kek_salt)
}

/// Encrypt the DEK under the KEK with a fresh random nonce and empty AAD.
pub fn wrap_dek(kek: &[u8; KEK_LEN], dek: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(kek));
    let nonce = random_nonce()?;
    let ct = cipher
        .encrypt(XNonce::from_slice(&nonce), dek)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Recover the DEK from its wrapped form.
///
/// Fails with [`CryptoError::Corrupt`] when the input is too short to hold a
/// nonce and tag, and with [`CryptoError::Auth`] when the tag does not
/// verify (wrong KEK, i.e. wrong password).
pub fn unwrap_dek(kek: &[u8; KEK_LEN], wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if wrapped.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Corrupt);
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(kek));
    let (nonce, ct) = wrapped.split_at(NONCE_LEN);
    let dek = cipher
        .decrypt(XNonce::from_slice(nonce), ct)
        .map_err(|_| CryptoError::Auth)?;
    Ok(Zeroizing::new(dek))
}

/// Derive the per-item key: HKDF-SHA-256 with the DEK as IKM, empty salt and
/// the item id bytes as info.
pub fn derive_item_key(dek: &[u8], item_id: Uuid) -> CryptoResult<[u8; DEK_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, dek);
    let mut key = [0u8; DEK_LEN];
    hk.expand(item_id.as_bytes(), &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// AAD layout: `user_id(16) || item_id(16) || big-endian u64 ver`.
fn blob_aad(user_id: Uuid, item_id: Uuid, ver: i64) -> [u8; 40] {
    let mut aad = [0u8; 40];
    aad[..16].copy_from_slice(user_id.as_bytes());
    aad[16..32].copy_from_slice(item_id.as_bytes());
    aad[32..].copy_from_slice(&(ver as u64).to_be_bytes());
    aad
}

/// Seal a record payload, binding it to `(user, item, version)`.
pub fn encrypt_blob(
    key: &[u8; DEK_LEN],
    user_id: Uuid,
    item_id: Uuid,
    ver: i64,
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = random_nonce()?;
    let aad = blob_aad(user_id, item_id, ver);
    let ct = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Open a record payload. Any mismatch in user, item, version or key fails
/// authentication with no further detail.
pub fn decrypt_blob(
    key: &[u8; DEK_LEN],
    user_id: Uuid,
    item_id: Uuid,
    ver: i64,
    blob: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Corrupt);
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let (nonce, ct) = blob.split_at(NONCE_LEN);
    let aad = blob_aad(user_id, item_id, ver);
    let pt = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ct,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::Auth)?;
    Ok(Zeroizing::new(pt))
}
