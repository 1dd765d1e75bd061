// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message store for deterministic testing.
//!
//! `MemoryStore` implements `MessageStore` with the same ordering and status
//! rules as the SQLite store, plus per-operation failure injection and a
//! journal of every call for ordering assertions.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use murmur_core::{
    HealthStatus, Message, MessageId, MessageStatus, MessageStore, MurmurError, NewMessage, UserId,
};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Save,
    GetMessage,
    ListConversation,
    SetStatus,
    ListUndelivered,
    HealthCheck,
}

/// One recorded call, with the arguments that matter for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Save {
        sender_id: UserId,
        recipient_id: UserId,
    },
    GetMessage {
        id: MessageId,
    },
    ListConversation {
        a: UserId,
        b: UserId,
        limit: i64,
        offset: i64,
    },
    SetStatus {
        id: MessageId,
        status: MessageStatus,
    },
    ListUndelivered {
        user: UserId,
    },
    HealthCheck,
}

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    next_id: i64,
    failing: HashSet<StoreOp>,
    journal: Vec<StoreCall>,
}

/// An in-memory `MessageStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` fail (or succeed again).
    pub fn set_failing(&self, op: StoreOp, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing.insert(op);
        } else {
            inner.failing.remove(&op);
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().journal.clone()
    }

    /// Every stored message, in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.lock().messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn status_of(&self, id: MessageId) -> Option<MessageStatus> {
        self.get(id).map(|m| m.status)
    }

    /// Insert a message as-is, bypassing the journal. Useful for backdated fixtures.
    pub fn seed(&self, message: NewMessage) -> Message {
        let mut inner = self.lock();
        inner.next_id += 1;
        let saved = message.into_message(MessageId(inner.next_id));
        inner.messages.push(saved.clone());
        saved
    }

    /// Poll until `id` reaches `status`, or give up after `timeout`.
    pub async fn wait_for_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        timeout: Duration,
    ) -> bool {
        let poll = async {
            loop {
                if self.status_of(id) == Some(status) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the store from the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, op: StoreOp, call: StoreCall) -> Result<std::sync::MutexGuard<'_, Inner>, MurmurError> {
        let mut inner = self.lock();
        inner.journal.push(call);
        if inner.failing.contains(&op) {
            return Err(MurmurError::storage(format!("injected {op:?} failure")));
        }
        Ok(inner)
    }
}

fn sort_by_time(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl MessageStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, message: NewMessage) -> Result<Message, MurmurError> {
        let mut inner = self.begin(
            StoreOp::Save,
            StoreCall::Save {
                sender_id: message.sender_id,
                recipient_id: message.recipient_id,
            },
        )?;
        inner.next_id += 1;
        let saved = message.into_message(MessageId(inner.next_id));
        inner.messages.push(saved.clone());
        Ok(saved)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>, MurmurError> {
        let inner = self.begin(StoreOp::GetMessage, StoreCall::GetMessage { id })?;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, MurmurError> {
        let inner = self.begin(
            StoreOp::ListConversation,
            StoreCall::ListConversation {
                a,
                b,
                limit,
                offset,
            },
        )?;
        let mut matching: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.recipient_id == b) || (m.sender_id == b && m.recipient_id == a)
            })
            .cloned()
            .collect();
        sort_by_time(&mut matching);
        Ok(matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), MurmurError> {
        let mut inner = self.begin(StoreOp::SetStatus, StoreCall::SetStatus { id, status })?;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(MurmurError::NotFound { message_id: id.0 })?;
        if message.status.can_advance_to(status) {
            message.status = status;
        }
        Ok(())
    }

    async fn list_undelivered(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, MurmurError> {
        let inner = self.begin(StoreOp::ListUndelivered, StoreCall::ListUndelivered { user })?;
        let mut pending: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.recipient_id == user && m.status != MessageStatus::Read && m.created_at > since)
            .cloned()
            .collect();
        sort_by_time(&mut pending);
        Ok(pending)
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        let failing = self.lock().failing.contains(&StoreOp::HealthCheck);
        self.lock().journal.push(StoreCall::HealthCheck);
        Ok(if failing {
            HealthStatus::Unhealthy("injected failure".into())
        } else {
            HealthStatus::Healthy
        })
    }
}
