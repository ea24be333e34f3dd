//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
}

impl AppConfig {
    /// Create a test configuration backed by an in-tree SQLite file.
    ///
    /// **For testing only.** The signing key is a fixed dummy value.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                trust_forwarded_for: true,
                ..Default::default()
            },
            database: DatabaseConfig::Sqlite {
                path: PathBuf::from("gophkeeper-test.db"),
            },
            auth: AuthConfig {
                sign_key: "test-signing-key-not-for-production".to_string(),
                access_ttl_secs: default_access_ttl_secs(),
            },
            limiter: LimiterConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum number of intents accepted in one upsert batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Trust the X-Forwarded-For header for client IP extraction.
    /// Only enable behind a reverse proxy that overwrites the header;
    /// otherwise clients can spoof the IP the login limiter keys on.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    crate::MAX_BODY_BYTES
}

fn default_max_batch() -> usize {
    crate::DEFAULT_MAX_BATCH
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            max_batch: default_max_batch(),
            trust_forwarded_for: false,
        }
    }
}

/// Vault store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database (recommended for testing and single-node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database (canonical production backend).
    Postgres {
        /// Connection URL.
        url: String,
        /// Connection pool size.
        #[serde(default = "default_pg_max_connections")]
        max_connections: u32,
        /// Optional statement timeout in milliseconds.
        #[serde(default)]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_pg_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/gophkeeper.db"),
        }
    }
}

/// Token issuance configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Immutable after startup.
    pub sign_key: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
}

fn default_access_ttl_secs() -> u64 {
    900 // 15 minutes
}

impl AuthConfig {
    /// Get the access token lifetime as a Duration.
    pub fn access_ttl(&self) -> Duration {
        let secs = i64::try_from(self.access_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }
}

/// Login rate limiter configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Sliding window length in seconds.
    #[serde(default = "default_limiter_window_secs")]
    pub window_secs: u64,
    /// Failures within the window before a lockout.
    #[serde(default = "default_limiter_max_fails")]
    pub max_fails: i64,
    /// Lockout length in seconds.
    #[serde(default = "default_limiter_block_secs")]
    pub block_secs: u64,
}

fn default_limiter_window_secs() -> u64 {
    900
}

fn default_limiter_max_fails() -> i64 {
    5
}

fn default_limiter_block_secs() -> u64 {
    900
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_secs: default_limiter_window_secs(),
            max_fails: default_limiter_max_fails(),
            block_secs: default_limiter_block_secs(),
        }
    }
}

impl LimiterConfig {
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX))
    }

    pub fn block_for(&self) -> Duration {
        Duration::seconds(i64::try_from(self.block_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind, "127.0.0.1:8080");
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
        assert_eq!(cfg.max_batch, 1000);
        assert!(!cfg.trust_forwarded_for);
    }

    #[test]
    fn limiter_defaults_cover_fifteen_minutes() {
        let cfg = LimiterConfig::default();
        assert_eq!(cfg.window(), Duration::minutes(15));
        assert_eq!(cfg.block_for(), Duration::minutes(15));
        assert_eq!(cfg.max_fails, 5);
    }

    #[test]
    fn app_config_parses_with_defaults() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "auth": { "sign_key": "secret" }
        }))
        .unwrap();
        assert_eq!(cfg.auth.access_ttl(), Duration::minutes(15));
        assert!(matches!(cfg.database, DatabaseConfig::Sqlite { .. }));
    }
}
