// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Murmur messaging hub.
//!
//! Authenticates callers with HMAC bearer tokens, upgrades `/api/chat/ws`
//! into hub connections, and serves conversation history, read receipts, and
//! a health check.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{AuthUser, DenyAll, TokenAuthority};
pub use server::{GatewayState, router, serve, start_server};
