// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use murmur_config::model::HubConfig;
use murmur_core::{Authenticator, MessageStore, MurmurError};
use murmur_hub::{ConversationService, Hub};

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Validation, persistence, routing, and history.
    pub service: Arc<ConversationService>,
    /// Live connection registry, for the health report.
    pub hub: Arc<Hub>,
    /// Store checked by `/health`.
    pub store: Arc<dyn MessageStore>,
    /// Resolves bearer tokens to users.
    pub auth: Arc<dyn Authenticator>,
    /// Upper bound on inbound WebSocket message size.
    pub max_frame_bytes: usize,
    /// History page size when the request names no `limit`.
    pub default_history_limit: i64,
}

impl GatewayState {
    pub fn new(
        service: Arc<ConversationService>,
        store: Arc<dyn MessageStore>,
        auth: Arc<dyn Authenticator>,
        hub_config: &HubConfig,
    ) -> Self {
        Self {
            hub: Arc::clone(service.hub()),
            service,
            store,
            auth,
            max_frame_bytes: hub_config.max_frame_bytes,
            default_history_limit: hub_config.default_history_limit,
        }
    }
}

/// Build the gateway router.
///
/// - GET  /health (no auth)
/// - GET  /api/chat/ws (auth during the handshake)
/// - GET  /api/chat/history
/// - POST /api/chat/messages/{message_id}/read
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    // Each handler takes `AuthUser`, so authentication happens in the extractor.
    let api_routes = Router::new()
        .route("/api/chat/ws", get(ws::ws_handler))
        .route("/api/chat/history", get(handlers::get_history))
        .route(
            "/api/chat/messages/{message_id}/read",
            post(handlers::post_mark_read),
        )
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn start_server(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), MurmurError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MurmurError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), MurmurError> {
    let local = listener
        .local_addr()
        .map_err(|e| MurmurError::Channel {
            message: format!("gateway listener has no address: {e}"),
            source: Some(Box::new(e)),
        })?;
    tracing::info!(addr = %local, "gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| MurmurError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
