// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time private messaging core for Murmur.
//!
//! - [`Hub`]: registry of the single live connection per user, and the router
//! - [`Connection`]: one transport with a read loop, a write loop, and a bounded mailbox
//! - [`ConversationService`]: validate, persist, route; replay on connect; history; read receipts
//!
//! The hub never blocks on a slow peer: every enqueue is non-blocking and a
//! miss is logged and reported, never retried.

pub mod connection;
pub mod conversation;
pub mod envelope;
pub mod frame;
pub mod hub;
pub mod mailbox;

pub use connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionState, InboundHandler, LoopSettings,
};
pub use conversation::ConversationService;
pub use envelope::{ChatMessage, Envelope, ErrorPayload, InboundFrame};
pub use frame::{BoxError, Frame, Transport};
pub use hub::{Hub, RouteOutcome};
pub use mailbox::{DeliveryMiss, Mailbox};
