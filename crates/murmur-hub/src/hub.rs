// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide registry of live connections and the private-message router.
//!
//! At most one connection is registered per user. Registry guards are held
//! only for the map operation itself; mailbox pushes, status updates, and
//! socket writes all happen after the guard is released.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use murmur_core::{Message, MessageStatus, MessageStore, UserId};

use crate::connection::{Connection, ConnectionHandle, ConnectionId};
use crate::envelope::{ChatMessage, Envelope};
use crate::mailbox::DeliveryMiss;

/// Result of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Enqueued on the recipient's connection.
    Delivered(ConnectionId),
    /// The recipient has no registered connection.
    Offline,
    /// The recipient is connected but the envelope was dropped.
    Dropped(DeliveryMiss),
}

impl fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteOutcome::Delivered(_) => f.write_str("delivered"),
            RouteOutcome::Offline => f.write_str("offline"),
            RouteOutcome::Dropped(miss) => write!(f, "dropped_{miss}"),
        }
    }
}

impl RouteOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RouteOutcome::Delivered(_))
    }
}

/// Registry mapping each online user to their single active connection.
pub struct Hub {
    connections: DashMap<UserId, ConnectionHandle>,
    store: Arc<dyn MessageStore>,
}

impl Hub {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            connections: DashMap::new(),
            store,
        }
    }

    /// Register `connection` as its user's active connection and start its loops.
    ///
    /// A previously registered connection for the same user is closed: its
    /// writer sends a close frame and its later unregistration is a no-op.
    pub fn register(self: &Arc<Self>, connection: Connection) -> ConnectionHandle {
        let handle = connection.handle().clone();
        let previous = self.connections.insert(handle.user_id(), handle.clone());

        if let Some(previous) = previous
            && !previous.same_connection(&handle)
        {
            info!(
                user_id = handle.user_id().0,
                superseded = %previous.id(),
                connection_id = %handle.id(),
                "closing superseded connection"
            );
            previous.close();
        }

        connection.spawn(Arc::clone(self));
        info!(
            user_id = handle.user_id().0,
            connection_id = %handle.id(),
            online = self.connections.len(),
            "connection registered"
        );
        handle
    }

    /// Remove `handle` if it is still the active connection for its user.
    ///
    /// Closes the mailbox on removal. Returns `false` (and does nothing) when
    /// the entry is absent or already refers to a newer connection.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let removed = self
            .connections
            .remove_if(&handle.user_id(), |_, current| current.same_connection(handle))
            .is_some();
        if removed {
            handle.close();
            info!(
                user_id = handle.user_id().0,
                connection_id = %handle.id(),
                "connection unregistered"
            );
        }
        removed
    }

    /// Push `message` to its recipient if they are online.
    ///
    /// On a successful enqueue the stored status is advanced to `Delivered` in
    /// the background. Misses leave the message `Sent` for the next replay.
    pub fn route_private_message(&self, message: &Message) -> RouteOutcome {
        let recipient = message.recipient_id;
        let Some(handle) = self.connection(recipient) else {
            debug!(
                message_id = message.id.0,
                recipient_id = recipient.0,
                "recipient offline, message left pending"
            );
            return RouteOutcome::Offline;
        };

        let envelope = Envelope::NewPrivateMessage(ChatMessage::from(message));
        match handle.try_deliver(envelope) {
            Ok(()) => {
                let store = Arc::clone(&self.store);
                let id = message.id;
                tokio::spawn(async move {
                    if let Err(e) = store.set_status(id, MessageStatus::Delivered).await {
                        warn!(message_id = id.0, error = %e, "failed to mark message delivered");
                    }
                });
                debug!(
                    message_id = message.id.0,
                    recipient_id = recipient.0,
                    connection_id = %handle.id(),
                    "message routed"
                );
                RouteOutcome::Delivered(handle.id())
            }
            Err(miss) => {
                warn!(
                    message_id = message.id.0,
                    recipient_id = recipient.0,
                    connection_id = %handle.id(),
                    reason = %miss,
                    "recipient mailbox {miss}, message left pending"
                );
                RouteOutcome::Dropped(miss)
            }
        }
    }

    /// The active connection for `user`, if any.
    pub fn connection(&self, user: UserId) -> Option<ConnectionHandle> {
        self.connections.get(&user).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.connections.contains_key(&user)
    }

    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    /// Close every registered connection. Used on shutdown.
    pub fn close_all(&self) {
        let handles: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for handle in &handles {
            handle.close();
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "closed all connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_outcome_display() {
        assert_eq!(RouteOutcome::Offline.to_string(), "offline");
        assert_eq!(
            RouteOutcome::Dropped(DeliveryMiss::Full).to_string(),
            "dropped_full"
        );
        assert_eq!(
            RouteOutcome::Delivered(ConnectionId::new()).to_string(),
            "delivered"
        );
        assert!(RouteOutcome::Delivered(ConnectionId::new()).is_delivered());
        assert!(!RouteOutcome::Offline.is_delivered());
    }
}
