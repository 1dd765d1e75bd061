// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Murmur private-messaging hub.
//!
//! This crate provides the shared domain types, the workspace error type, and
//! the collaborator traits (message store, authenticator) that the hub,
//! storage, and gateway crates implement or consume.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MurmurError;
pub use traits::{Authenticator, MessageStore};
pub use types::{
    HealthStatus, Message, MessageId, MessageStatus, NewMessage, UserId, format_timestamp,
};
