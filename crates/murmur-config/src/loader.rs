// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./murmur.toml` > `~/.config/murmur/murmur.toml` > `/etc/murmur/murmur.toml`
//! with environment variable overrides via `MURMUR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MurmurConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/murmur/murmur.toml`
/// 3. `~/.config/murmur/murmur.toml`
/// 4. `./murmur.toml`
/// 5. `MURMUR_*` environment variables
pub fn load_config() -> Result<MurmurConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::file("/etc/murmur/murmur.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("murmur/murmur.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("murmur.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `MURMUR_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys such as
/// `mailbox_capacity` contain underscores: `MURMUR_HUB_MAILBOX_CAPACITY` must
/// become `hub.mailbox_capacity`, not `hub.mailbox.capacity`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("MURMUR_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ["server", "storage", "hub", "auth"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("hub_mailbox_capacity"), "hub.mailbox_capacity");
        assert_eq!(map_env_key("server_port"), "server.port");
        assert_eq!(map_env_key("auth_token_secret"), "auth.token_secret");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = load_config_from_str("[hub]\nmailbox_capacity = 8\n").unwrap();
        assert_eq!(config.hub.mailbox_capacity, 8);
        assert_eq!(config.hub.max_content_bytes, 1024);
    }
}
