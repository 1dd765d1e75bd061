// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Murmur messaging hub.

use thiserror::Error;

/// The primary error type used across all Murmur crates.
///
/// Delivery misses (recipient offline, mailbox full) are deliberately absent:
/// they are outcomes, not errors, and never travel up the call chain.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database unavailable, constraint violation, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input rejected before anything was persisted.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A status update matched no stored message.
    #[error("message {message_id} not found")]
    NotFound { message_id: i64 },

    /// Transport errors (socket closed, write failure, bind failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller could not be authenticated.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MurmurError {
    /// Shorthand for wrapping any storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage { source: err.into() }
    }

    /// Returns `true` for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Auth(_)
        )
    }
}
