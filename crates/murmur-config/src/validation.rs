// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, ordered timeouts, and minimum secret lengths.

use crate::diagnostic::ConfigError;
use crate::model::MurmurConfig;

/// Shortest HMAC secret accepted for signing bearer tokens.
pub const MIN_TOKEN_SECRET_BYTES: usize = 16;

/// Longest offline replay window, in days.
pub const MAX_REPLAY_LOOKBACK_DAYS: u32 = 3650;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MurmurConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.server.log_level
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let hub = &config.hub;
    if hub.mailbox_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "hub.mailbox_capacity must be at least 1".to_string(),
        });
    }

    if hub.max_frame_bytes == 0 || hub.max_content_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "hub.max_frame_bytes and hub.max_content_bytes must be positive".to_string(),
        });
    }

    if hub.pong_wait_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "hub.pong_wait_secs must be positive".to_string(),
        });
    }

    if hub.write_wait_secs == 0 || hub.write_wait_secs >= hub.pong_wait_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "hub.write_wait_secs must be positive and below hub.pong_wait_secs ({}), got {}",
                hub.pong_wait_secs, hub.write_wait_secs
            ),
        });
    }

    if hub.replay_lookback_days > MAX_REPLAY_LOOKBACK_DAYS {
        errors.push(ConfigError::Validation {
            message: format!(
                "hub.replay_lookback_days must be at most {MAX_REPLAY_LOOKBACK_DAYS}, got {}",
                hub.replay_lookback_days
            ),
        });
    }

    if hub.default_history_limit < 1 || hub.max_history_limit < hub.default_history_limit {
        errors.push(ConfigError::Validation {
            message: format!(
                "hub.default_history_limit ({}) must be at least 1 and no larger than hub.max_history_limit ({})",
                hub.default_history_limit, hub.max_history_limit
            ),
        });
    }

    if let Some(secret) = &config.auth.token_secret
        && secret.len() < MIN_TOKEN_SECRET_BYTES
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "auth.token_secret must be at least {MIN_TOKEN_SECRET_BYTES} bytes, got {}",
                secret.len()
            ),
        });
    }

    if config.auth.token_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "auth.token_ttl_secs must be positive".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
