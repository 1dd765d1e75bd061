// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The hub and conversation service only ever talk to persistence and
//! authentication through these traits, so they can be swapped for
//! in-memory doubles in tests.

pub mod auth;
pub mod storage;

pub use auth::Authenticator;
pub use storage::MessageStore;
