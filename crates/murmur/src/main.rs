// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Murmur - a real-time private messaging hub.
//!
//! This is the binary entry point for the Murmur server.

mod serve;
mod shutdown;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use murmur_config::{ConfigError, MurmurConfig};
use murmur_core::{MurmurError, UserId};
use murmur_gateway::TokenAuthority;

/// Murmur - a real-time private messaging hub.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the messaging server.
    Serve,
    /// Print a bearer token for a user.
    Token {
        /// User the token is issued for.
        #[arg(long)]
        user_id: i64,
        /// Token lifetime in seconds (defaults to auth.token_ttl_secs).
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Validate the configuration and print a summary.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            murmur_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Token { user_id, ttl_secs } => {
            issue_token(&config, UserId(user_id), ttl_secs).map(|token| println!("{token}"))
        }
        Commands::CheckConfig => {
            print!("{}", config_summary(&config));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("murmur: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<MurmurConfig, Vec<ConfigError>> {
    match path {
        Some(path) => murmur_config::load_and_validate_path(path),
        None => murmur_config::load_and_validate(),
    }
}

fn issue_token(
    config: &MurmurConfig,
    user: UserId,
    ttl_secs: Option<u64>,
) -> Result<String, MurmurError> {
    let authority = TokenAuthority::from_config(&config.auth)
        .ok_or_else(|| MurmurError::Config("auth.token_secret is not set".into()))?;
    let authority = match ttl_secs {
        Some(0) => return Err(MurmurError::Validation("--ttl-secs must be positive".into())),
        Some(secs) => {
            let secret = config.auth.token_secret.as_deref().unwrap_or_default();
            TokenAuthority::new(secret.as_bytes(), Duration::from_secs(secs))
        }
        None => authority,
    };
    authority.issue(user)
}

fn config_summary(config: &MurmurConfig) -> String {
    format!(
        "murmur: config OK\n  \
         listen:     {}:{}\n  \
         log level:  {}\n  \
         database:   {} (wal={})\n  \
         mailbox:    {} envelopes, frames <= {} bytes, content <= {} bytes\n  \
         keepalive:  pong wait {}s, write wait {}s\n  \
         replay:     last {} days\n  \
         auth:       {}\n",
        config.server.host,
        config.server.port,
        config.server.log_level,
        config.storage.database_path,
        config.storage.wal_mode,
        config.hub.mailbox_capacity,
        config.hub.max_frame_bytes,
        config.hub.max_content_bytes,
        config.hub.pong_wait_secs,
        config.hub.write_wait_secs,
        config.hub.replay_lookback_days,
        if config.auth.token_secret.is_some() {
            "token secret configured"
        } else {
            "no token secret (all requests rejected)"
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::Authenticator;

    fn config_with_secret() -> MurmurConfig {
        murmur_config::load_and_validate_str(
            "[auth]\ntoken_secret = \"0123456789abcdef0123\"\n",
        )
        .unwrap()
    }

    #[test]
    fn cli_parses_token_command() {
        let cli = Cli::try_parse_from(["murmur", "token", "--user-id", "7", "--ttl-secs", "60"])
            .unwrap();
        match cli.command {
            Commands::Token { user_id, ttl_secs } => {
                assert_eq!(user_id, 7);
                assert_eq!(ttl_secs, Some(60));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_accepts_global_config_flag() {
        let cli = Cli::try_parse_from(["murmur", "check-config", "--config", "/tmp/m.toml"])
            .unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["murmur"]).is_err());
    }

    #[test]
    fn issued_token_authenticates() {
        let config = config_with_secret();
        let token = issue_token(&config, UserId(5), Some(120)).unwrap();
        let authority = TokenAuthority::from_config(&config.auth).unwrap();
        assert_eq!(authority.authenticate(&token).unwrap(), UserId(5));
    }

    #[test]
    fn token_requires_secret() {
        let config = murmur_config::load_and_validate_str("").unwrap();
        let err = issue_token(&config, UserId(5), None).unwrap_err();
        assert!(matches!(err, MurmurError::Config(_)));
        assert!(issue_token(&config_with_secret(), UserId(5), Some(0)).is_err());
    }

    #[test]
    fn summary_mentions_key_settings() {
        let summary = config_summary(&config_with_secret());
        assert!(summary.contains("127.0.0.1:8080"));
        assert!(summary.contains("murmur.db"));
        assert!(summary.contains("token secret configured"));
        assert!(!summary.contains("0123456789abcdef"));
    }
}
