// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end messaging tests.
//!
//! `TestHarness` assembles a complete messaging stack (in-memory store, hub,
//! conversation service) and connects mock clients to it.

use std::sync::Arc;

use murmur_config::model::HubConfig;
use murmur_core::{MurmurError, UserId};
use murmur_hub::{ConnectionHandle, ConversationService, Hub};

use crate::memory_store::MemoryStore;
use crate::mock_transport::{MockPeer, MockTransport};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: HubConfig,
    store: Option<Arc<MemoryStore>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: HubConfig::default(),
            store: None,
        }
    }

    /// Use a specific mailbox capacity for every connection.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Replace the whole hub configuration.
    pub fn with_config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a pre-populated store.
    pub fn with_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> TestHarness {
        let store = self.store.unwrap_or_default();
        let hub = Arc::new(Hub::new(store.clone()));
        let service = Arc::new(ConversationService::new(
            Arc::clone(&hub),
            store.clone(),
            self.config.clone(),
        ));
        TestHarness {
            store,
            hub,
            service,
            config: self.config,
        }
    }
}

/// A wired messaging stack backed by [`MemoryStore`].
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub hub: Arc<Hub>,
    pub service: Arc<ConversationService>,
    pub config: HubConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Connect a mock client as `user`, replaying their pending messages.
    pub async fn connect(&self, user: i64) -> Result<(ConnectionHandle, MockPeer), MurmurError> {
        let (transport, peer) = MockTransport::pair();
        let handle = self
            .service
            .handle_new_connection(UserId(user), transport)
            .await?;
        Ok((handle, peer))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
