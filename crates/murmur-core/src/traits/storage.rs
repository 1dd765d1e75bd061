// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store trait for durable persistence backends (SQLite, in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MurmurError;
use crate::types::{HealthStatus, Message, MessageId, MessageStatus, NewMessage, UserId};

/// Durable persistence for messages and their delivery status.
///
/// Every operation is cancellable by dropping its future. Failures surface as
/// [`MurmurError::Storage`]; implementations never retry silently.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Append a message. The store assigns a monotonically increasing id.
    async fn save(&self, message: NewMessage) -> Result<Message, MurmurError>;

    /// Messages exchanged between `a` and `b` in either direction, oldest first.
    async fn list_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, MurmurError>;

    /// A single message by id, or `None` when no message has this id.
    async fn get_message(&self, id: MessageId) -> Result<Option<Message>, MurmurError>;

    /// Move a message forward to `status`.
    ///
    /// Returns [`MurmurError::NotFound`] when no message has this id. A request
    /// that would not advance the status (equal or backward) succeeds without
    /// changing anything.
    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), MurmurError>;

    /// Messages addressed to `user` created after `since` whose status is not
    /// `Read`, oldest first.
    async fn list_undelivered(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, MurmurError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<HealthStatus, MurmurError>;
}
