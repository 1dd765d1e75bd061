// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes exchanged over a connection.
//!
//! Client -> Server (JSON):
//! ```json
//! {"recipientid": 2, "content": "hi"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "new_private_message", "payload": {"id": 1, "senderid": 1, "recipientid": 2, "content": "hi", "timestamp": "...", "status": "sent"}}
//! {"type": "offline_message", "payload": {...}}
//! {"type": "error", "payload": {"code": "invalid_message", "message": "Invalid message format"}}
//! {"type": "message_send_failed", "payload": {"code": "send_error", "message": "..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use murmur_core::{Message, MessageId, MessageStatus, UserId};

/// Error codes carried in [`ErrorPayload::code`].
pub mod codes {
    /// The inbound frame could not be decoded.
    pub const INVALID_MESSAGE: &str = "invalid_message";
    /// The inbound message was decoded but could not be accepted.
    pub const SEND_ERROR: &str = "send_error";
}

/// A private message as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(rename = "senderid")]
    pub sender_id: UserId,
    #[serde(rename = "recipientid")]
    pub recipient_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            recipient_id: msg.recipient_id,
            content: msg.content.clone(),
            timestamp: msg.created_at,
            status: msg.status,
        }
    }
}

/// In-band error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Server-to-client envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Envelope {
    /// A message routed live to its recipient.
    NewPrivateMessage(ChatMessage),
    /// A message replayed after (re)connection.
    OfflineMessage(ChatMessage),
    /// The last inbound frame was malformed.
    Error(ErrorPayload),
    /// The last inbound message was rejected or could not be stored.
    MessageSendFailed(ErrorPayload),
}

impl Envelope {
    pub fn invalid_message() -> Self {
        Envelope::Error(ErrorPayload {
            code: codes::INVALID_MESSAGE.to_string(),
            message: "Invalid message format".to_string(),
        })
    }

    pub fn send_failed(message: impl Into<String>) -> Self {
        Envelope::MessageSendFailed(ErrorPayload {
            code: codes::SEND_ERROR.to_string(),
            message: message.into(),
        })
    }

    /// The `type` tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::NewPrivateMessage(_) => "new_private_message",
            Envelope::OfflineMessage(_) => "offline_message",
            Envelope::Error(_) => "error",
            Envelope::MessageSendFailed(_) => "message_send_failed",
        }
    }
}

/// Client-to-server private message request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "recipientid")]
    pub recipient_id: UserId,
    pub content: String,
}
