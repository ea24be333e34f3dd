//! Login rate limiter: sliding-window failure counter with timed lockout,
//! keyed by `(username, ip_hash)`.
//!
//! Raw IPs are never stored; callers pass `hash_ip(ip)`. Counter updates are
//! atomic per row — a single upserting statement with `RETURNING` on
//! PostgreSQL, a serialized transaction on SQLite — so no in-process
//! locking is needed.

use crate::error::StoreResult;
use async_trait::async_trait;
use gophkeeper_core::config::LimiterConfig;
use sha2::{Digest, Sha256};
use time::Duration;

/// SHA-256 of an IP string, the only form the limiter ever persists.
pub fn hash_ip(ip: &str) -> Vec<u8> {
    Sha256::digest(ip.as_bytes()).to_vec()
}

/// Limiter tuning: window, failure threshold and lockout length.
#[derive(Debug, Clone, Copy)]
pub struct LimiterParams {
    pub window: Duration,
    pub max_fails: i64,
    pub block_for: Duration,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self::from(&LimiterConfig::default())
    }
}

impl From<&LimiterConfig> for LimiterParams {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            window: config.window(),
            max_fails: config.max_fails,
            block_for: config.block_for(),
        }
    }
}

/// Outcome of the pre-login gate.
#[derive(Debug, Clone, Copy)]
pub struct LoginGate {
    pub allowed: bool,
    /// Time until the lockout expires; zero when allowed.
    pub retry_after: Duration,
}

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy)]
pub struct FailureOutcome {
    /// Whether this failure tripped the threshold and placed a block.
    pub blocked_now: bool,
    /// Length of the block just placed; zero otherwise.
    pub retry_after: Duration,
}

/// Controls login attempts and temporary lockouts.
#[async_trait]
pub trait LoginLimiter: Send + Sync {
    /// Report whether a login attempt is currently allowed.
    async fn allow(&self, username: &str, ip_hash: &[u8]) -> StoreResult<LoginGate>;

    /// Reset counters after a successful login.
    async fn record_success(&self, username: &str, ip_hash: &[u8]) -> StoreResult<()>;

    /// Record a failed attempt. Rolls the window over when the previous
    /// update is older than `window`; places a block once the count reaches
    /// `max_fails`.
    async fn record_failure(&self, username: &str, ip_hash: &[u8]) -> StoreResult<FailureOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_hash_is_stable_and_ip_specific() {
        assert_eq!(hash_ip("1.2.3.4"), hash_ip("1.2.3.4"));
        assert_ne!(hash_ip("1.2.3.4"), hash_ip("1.2.3.5"));
        assert_eq!(hash_ip("1.2.3.4").len(), 32);
    }
}
