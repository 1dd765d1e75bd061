// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Murmur integration tests.
//!
//! Provides in-memory collaborators and a harness for fast, deterministic,
//! CI-runnable tests without sockets or a database.
//!
//! # Components
//!
//! - [`MockTransport`] - In-memory duplex transport with a scriptable peer
//! - [`MemoryStore`] - In-memory message store with failure injection and a call journal
//! - [`TestHarness`] - Store, hub, and conversation service wired together

pub mod harness;
pub mod memory_store;
pub mod mock_transport;

pub use harness::TestHarness;
pub use memory_store::{MemoryStore, StoreCall, StoreOp};
pub use mock_transport::{MockPeer, MockTransport};
