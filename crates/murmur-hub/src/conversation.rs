// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation service: accept, persist, and route private messages;
//! replay pending messages on connect; serve history; mark messages read.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use murmur_config::model::HubConfig;
use murmur_core::{
    Message, MessageId, MessageStatus, MessageStore, MurmurError, NewMessage, UserId,
};

use crate::connection::{Connection, ConnectionHandle, InboundHandler, LoopSettings};
use crate::envelope::{ChatMessage, Envelope, InboundFrame};
use crate::frame::Transport;
use crate::hub::{Hub, RouteOutcome};

/// Coordinates the message store and the hub.
pub struct ConversationService {
    hub: Arc<Hub>,
    store: Arc<dyn MessageStore>,
    config: HubConfig,
}

impl ConversationService {
    pub fn new(hub: Arc<Hub>, store: Arc<dyn MessageStore>, config: HubConfig) -> Self {
        Self { hub, store, config }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Validate, persist, then route a private message.
    ///
    /// Nothing is routed unless the store accepted the message.
    pub async fn submit_message(
        &self,
        sender: UserId,
        recipient: UserId,
        content: String,
    ) -> Result<(Message, RouteOutcome), MurmurError> {
        self.validate(sender, recipient, &content)?;

        let saved = self
            .store
            .save(NewMessage::new(sender, recipient, content))
            .await
            .inspect_err(|e| {
                warn!(sender_id = sender.0, recipient_id = recipient.0, error = %e, "failed to save message");
            })?;
        debug!(
            message_id = saved.id.0,
            sender_id = sender.0,
            recipient_id = recipient.0,
            "message saved"
        );

        let outcome = self.hub.route_private_message(&saved);
        Ok((saved, outcome))
    }

    fn validate(&self, sender: UserId, recipient: UserId, content: &str) -> Result<(), MurmurError> {
        if content.is_empty() {
            return Err(MurmurError::Validation(
                "message content cannot be empty".into(),
            ));
        }
        if content.len() > self.config.max_content_bytes {
            return Err(MurmurError::Validation(format!(
                "message content exceeds {} bytes",
                self.config.max_content_bytes
            )));
        }
        if !recipient.is_valid() {
            return Err(MurmurError::Validation("invalid recipient ID".into()));
        }
        if !sender.is_valid() {
            return Err(MurmurError::Validation("invalid sender ID".into()));
        }
        if sender == recipient {
            return Err(MurmurError::Validation(
                "sender and recipient cannot be the same".into(),
            ));
        }
        Ok(())
    }

    /// Register a freshly authenticated transport for `user` and replay
    /// messages still waiting for them.
    ///
    /// Replay is best effort: a store failure or a full mailbox is logged and
    /// the connection stays registered.
    pub async fn handle_new_connection(
        self: &Arc<Self>,
        user: UserId,
        transport: Transport,
    ) -> Result<ConnectionHandle, MurmurError> {
        if !user.is_valid() {
            return Err(MurmurError::Validation("invalid user ID".into()));
        }

        let handler: Arc<dyn InboundHandler> = Arc::clone(self) as Arc<dyn InboundHandler>;
        let connection = Connection::new(
            user,
            transport,
            handler,
            self.config.mailbox_capacity,
            LoopSettings::from(&self.config),
        );
        let handle = self.hub.register(connection);
        info!(user_id = user.0, connection_id = %handle.id(), "user connected");

        let since = self.replay_since();
        match self.store.list_undelivered(user, since).await {
            Ok(pending) if pending.is_empty() => {}
            Ok(pending) => {
                let total = pending.len();
                let replayed = pending
                    .iter()
                    .filter(|msg| handle.offer(Envelope::OfflineMessage(ChatMessage::from(*msg))))
                    .count();
                info!(user_id = user.0, total, replayed, "replayed pending messages");
            }
            Err(e) => {
                warn!(user_id = user.0, error = %e, "failed to load pending messages");
            }
        }

        Ok(handle)
    }

    /// Start of the offline replay window. A window reaching past the
    /// representable range replays the whole backlog.
    fn replay_since(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(self.config.replay_lookback())
            .unwrap_or_else(|| {
                warn!(
                    days = self.config.replay_lookback_days,
                    "replay lookback out of range, replaying full backlog"
                );
                DateTime::<Utc>::MIN_UTC
            })
    }

    /// Messages between `a` and `b`, oldest first.
    ///
    /// A non-positive limit or a negative offset falls back to the defaults.
    pub async fn fetch_history(
        &self,
        a: UserId,
        b: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, MurmurError> {
        let (limit, offset) = if limit <= 0 || offset < 0 {
            (self.config.default_history_limit, 0)
        } else {
            (limit.min(self.config.max_history_limit), offset)
        };

        let messages = self
            .store
            .list_conversation(a, b, limit, offset)
            .await
            .inspect_err(|e| {
                warn!(user_a = a.0, user_b = b.0, error = %e, "failed to fetch history");
            })?;
        debug!(
            user_a = a.0,
            user_b = b.0,
            count = messages.len(),
            "fetched conversation history"
        );
        Ok(messages)
    }

    /// Mark a message read. Marking an already-read message succeeds.
    ///
    /// Only the recipient may mark a message. Anyone else gets `NotFound`,
    /// the same answer as for an id that does not exist.
    pub async fn mark_read(&self, message_id: MessageId, user: UserId) -> Result<(), MurmurError> {
        if !message_id.is_valid() || !user.is_valid() {
            return Err(MurmurError::Validation(
                "invalid message ID or user ID".into(),
            ));
        }
        let message = self.store.get_message(message_id).await?;
        if message.is_none_or(|m| m.recipient_id != user) {
            debug!(message_id = message_id.0, user_id = user.0, "mark read refused, not the recipient");
            return Err(MurmurError::NotFound {
                message_id: message_id.0,
            });
        }
        self.store
            .set_status(message_id, MessageStatus::Read)
            .await
            .inspect_err(|e| {
                warn!(message_id = message_id.0, user_id = user.0, error = %e, "failed to mark message read");
            })?;
        info!(message_id = message_id.0, user_id = user.0, "message marked read");
        Ok(())
    }
}

#[async_trait]
impl InboundHandler for ConversationService {
    async fn on_private_message(
        &self,
        sender: UserId,
        request: InboundFrame,
    ) -> Result<(), MurmurError> {
        self.submit_message(sender, request.recipient_id, request.content)
            .await
            .map(|_| ())
    }
}
