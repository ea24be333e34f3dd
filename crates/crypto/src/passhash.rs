//! Server-side password hashing and verification.
//!
//! Argon2id tuned for roughly 100 ms of CPU per hash on commodity server
//! hardware. Verification recomputes the hash and compares in constant time.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

/// Argon2id iterations.
const ARGON_TIME: u32 = 3;
/// Argon2id memory cost in KiB (64 MiB).
const ARGON_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2id lanes.
const ARGON_LANES: u32 = 1;
/// Hash output length in bytes.
pub const HASH_LEN: usize = 32;
/// Per-user salt length in bytes.
pub const SALT_LEN: usize = 16;

fn argon2() -> Argon2<'static> {
    let params = Params::new(ARGON_MEMORY_KIB, ARGON_TIME, ARGON_LANES, Some(HASH_LEN))
        .expect("static Argon2 params are always valid");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Return `n` cryptographically secure random bytes.
///
/// Fails only when the OS random source does.
pub fn random_bytes(n: usize) -> CryptoResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(buf)
}

/// Argon2id hash of `password` under `salt`. Deterministic in both inputs.
pub fn hash_password(password: &[u8], salt: &[u8]) -> CryptoResult<[u8; HASH_LEN]> {
    let mut out = [0u8; HASH_LEN];
    argon2()
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Verify `password` against an expected hash in constant time.
pub fn verify_password(password: &[u8], salt: &[u8], expected: &[u8]) -> bool {
    match hash_password(password, salt) {
        Ok(got) => got.ct_eq(expected).into(),
        Err(_) => false,
    }
}
