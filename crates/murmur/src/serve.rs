// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `murmur serve`: wire storage, hub, service, and gateway, then run until signalled.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_config::MurmurConfig;
use murmur_core::{Authenticator, MurmurError};
use murmur_gateway::{DenyAll, GatewayState, TokenAuthority};
use murmur_hub::{ConversationService, Hub};
use murmur_storage::SqliteMessageStore;
use tracing::{debug, info, warn};

use crate::shutdown;

/// How long to wait for connection tasks to release the store on shutdown.
const STORE_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Run the messaging server until SIGINT or SIGTERM.
pub async fn run_serve(config: MurmurConfig) -> Result<(), MurmurError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "murmur starting");

    let store = Arc::new(SqliteMessageStore::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "message store opened");

    let auth: Arc<dyn Authenticator> = match TokenAuthority::from_config(&config.auth) {
        Some(authority) => Arc::new(authority),
        None => {
            warn!("auth.token_secret is not set, every authenticated request will be rejected");
            Arc::new(DenyAll)
        }
    };

    let hub = Arc::new(Hub::new(store.clone()));
    let service = Arc::new(ConversationService::new(
        Arc::clone(&hub),
        store.clone(),
        config.hub.clone(),
    ));
    let state = GatewayState::new(service, store.clone(), auth, &config.hub);

    let addr = resolve_addr(&config.server.host, config.server.port).await?;
    let cancel = shutdown::install_signal_handler();
    murmur_gateway::start_server(addr, state, cancel).await?;

    info!(online = hub.online_count(), "closing live connections");
    hub.close_all();
    drop(hub);

    close_store(store).await?;
    info!("murmur serve shutdown complete");
    Ok(())
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, MurmurError> {
    let channel_err = |message: String| MurmurError::Channel {
        message,
        source: None,
    };
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| MurmurError::Channel {
            message: format!("failed to resolve {host}:{port}: {e}"),
            source: Some(Box::new(e)),
        })?
        .next()
        .ok_or_else(|| channel_err(format!("{host}:{port} resolved to no address")))
}

/// Checkpoint and close the store once every connection task has let go of it.
async fn close_store(mut store: Arc<SqliteMessageStore>) -> Result<(), MurmurError> {
    let deadline = Instant::now() + STORE_CLOSE_GRACE;
    loop {
        match Arc::try_unwrap(store) {
            Ok(owned) => {
                owned.close().await?;
                debug!("message store closed");
                return Ok(());
            }
            Err(shared) if Instant::now() < deadline => {
                store = shared;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(shared) => {
                warn!(
                    holders = Arc::strong_count(&shared),
                    "store still in use, exiting without WAL checkpoint"
                );
                return Ok(());
            }
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("murmur={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
