// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Murmur configuration.
///
/// Every section is optional and defaults to values suitable for local development.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MurmurConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Message store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Connection hub tuning.
    #[serde(default)]
    pub hub: HubConfig,

    /// Bearer token settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "murmur.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Connection hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Slots in each connection's outbound mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Largest inbound frame accepted before the connection is dropped.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Largest message body accepted, in bytes.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,

    /// How long a connection may stay silent before it is considered dead.
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,

    /// Upper bound on a single outbound write burst.
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,

    /// How far back offline replay looks for unread messages.
    #[serde(default = "default_replay_lookback_days")]
    pub replay_lookback_days: u32,

    /// History page size used when the caller supplies none or an invalid one.
    #[serde(default = "default_history_limit")]
    pub default_history_limit: i64,

    /// Largest history page a caller may request.
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: i64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
            max_content_bytes: default_max_content_bytes(),
            pong_wait_secs: default_pong_wait_secs(),
            write_wait_secs: default_write_wait_secs(),
            replay_lookback_days: default_replay_lookback_days(),
            default_history_limit: default_history_limit(),
            max_history_limit: default_max_history_limit(),
        }
    }
}

impl HubConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    /// Keepalive pings go out at 9/10 of the read deadline.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    pub fn replay_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.replay_lookback_days))
    }
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    4096
}

fn default_max_content_bytes() -> usize {
    1024
}

fn default_pong_wait_secs() -> u64 {
    60
}

fn default_write_wait_secs() -> u64 {
    10
}

fn default_replay_lookback_days() -> u32 {
    7
}

fn default_history_limit() -> i64 {
    20
}

fn default_max_history_limit() -> i64 {
    100
}

/// Bearer token configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens. `None` rejects every request.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Lifetime of tokens minted by `murmur token`.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_is_nine_tenths_of_pong_wait() {
        let hub = HubConfig::default();
        assert_eq!(hub.pong_wait(), Duration::from_secs(60));
        assert_eq!(hub.ping_period(), Duration::from_secs(54));
    }

    #[test]
    fn replay_lookback_defaults_to_a_week() {
        assert_eq!(HubConfig::default().replay_lookback(), chrono::Duration::days(7));
    }

    #[test]
    fn auth_debug_redacts_secret() {
        let auth = AuthConfig {
            token_secret: Some("super-secret-value".into()),
            token_ttl_secs: 60,
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[redacted]"));
    }
}
