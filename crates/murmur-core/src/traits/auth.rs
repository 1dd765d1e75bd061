// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication trait for resolving a bearer credential to a user.

use crate::error::MurmurError;
use crate::types::UserId;

/// Resolves a bearer credential to the user it was issued for.
///
/// Verification is CPU-only (no I/O), so the trait is synchronous and can be
/// called from request extractors without spawning.
pub trait Authenticator: Send + Sync + 'static {
    /// Verify `token` and return its owner, or [`MurmurError::Auth`].
    fn authenticate(&self, token: &str) -> Result<UserId, MurmurError>;
}
