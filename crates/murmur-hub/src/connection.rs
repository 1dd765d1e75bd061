// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A live duplex transport bound to one authenticated user.
//!
//! Each registered connection runs two tasks:
//! 1. Read loop: decodes inbound frames and hands private messages to the
//!    [`InboundHandler`]
//! 2. Write loop: drains the mailbox onto the transport and sends keepalive pings
//!
//! The loops share nothing but the mailbox. Whichever exits first closes the
//! mailbox, which stops the other, and unregisters the connection from the hub.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use murmur_config::model::HubConfig;
use murmur_core::{MurmurError, UserId};

use crate::envelope::{Envelope, InboundFrame};
use crate::frame::{Frame, FrameSink, FrameStream, Transport};
use crate::hub::Hub;
use crate::mailbox::{DeliveryMiss, Mailbox, MailboxReceiver};

/// Receives well-formed private message requests from a connection's read loop.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    /// Handle one request from `sender`. An error is reported back to the
    /// sender as a `message_send_failed` envelope.
    async fn on_private_message(
        &self,
        sender: UserId,
        request: InboundFrame,
    ) -> Result<(), MurmurError>;
}

/// Unique identifier of one connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a connection. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    Closing,
    Closed,
}

const ACTIVE: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

struct HandleInner {
    id: ConnectionId,
    user_id: UserId,
    mailbox: Mailbox,
    state: AtomicU8,
}

/// Shared view of a connection: identity, mailbox, and lifecycle state.
///
/// The hub stores one of these per user. Cloning is cheap.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    pub(crate) fn new(user_id: UserId, mailbox: Mailbox) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: ConnectionId::new(),
                user_id,
                mailbox,
                state: AtomicU8::new(ACTIVE),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    pub fn state(&self) -> ConnectionState {
        match self.inner.state.load(Ordering::Acquire) {
            ACTIVE => ConnectionState::Active,
            CLOSING => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// Enqueue an envelope without waiting.
    pub fn try_deliver(&self, envelope: Envelope) -> Result<(), DeliveryMiss> {
        self.inner.mailbox.try_deliver(envelope)
    }

    /// Enqueue an envelope, logging a miss instead of returning it.
    pub fn offer(&self, envelope: Envelope) -> bool {
        let kind = envelope.kind();
        match self.try_deliver(envelope) {
            Ok(()) => true,
            Err(miss) => {
                warn!(
                    user_id = self.user_id().0,
                    connection_id = %self.id(),
                    envelope = kind,
                    reason = %miss,
                    "mailbox {miss}, envelope dropped"
                );
                false
            }
        }
    }

    /// Close the mailbox. Both loops stop shortly after. Idempotent.
    pub fn close(&self) {
        if self
            .inner
            .state
            .compare_exchange(ACTIVE, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(user_id = self.user_id().0, connection_id = %self.id(), "closing connection");
        }
        self.inner.mailbox.close();
    }

    pub fn is_closed(&self) -> bool {
        self.state() != ConnectionState::Active || self.inner.mailbox.is_closed()
    }

    /// Resolves once the mailbox is closed.
    pub async fn closed(&self) {
        self.inner.mailbox.closed().await
    }

    fn mark_closed(&self) {
        self.inner.state.store(CLOSED, Ordering::Release);
    }

    /// Whether both handles refer to the same connection instance.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("user_id", &self.user_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Timing and size limits applied by the loops.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub max_frame_bytes: usize,
    pub pong_wait: Duration,
    pub write_wait: Duration,
    pub ping_period: Duration,
}

impl From<&HubConfig> for LoopSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            max_frame_bytes: config.max_frame_bytes,
            pong_wait: config.pong_wait(),
            write_wait: config.write_wait(),
            ping_period: config.ping_period(),
        }
    }
}

/// A connection that has been created but not yet registered with a hub.
pub struct Connection {
    handle: ConnectionHandle,
    receiver: MailboxReceiver,
    transport: Transport,
    handler: Arc<dyn InboundHandler>,
    settings: LoopSettings,
}

impl Connection {
    pub fn new(
        user_id: UserId,
        transport: Transport,
        handler: Arc<dyn InboundHandler>,
        mailbox_capacity: usize,
        settings: LoopSettings,
    ) -> Self {
        let (mailbox, receiver) = Mailbox::new(mailbox_capacity);
        Self {
            handle: ConnectionHandle::new(user_id, mailbox),
            receiver,
            transport,
            handler,
            settings,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Start the read and write loops. Each unregisters from `hub` on exit.
    pub(crate) fn spawn(self, hub: Arc<Hub>) {
        let Connection {
            handle,
            receiver,
            transport,
            handler,
            settings,
        } = self;
        let (sink, stream) = transport.split();

        let reader_handle = handle.clone();
        let reader_hub = Arc::clone(&hub);
        tokio::spawn(async move {
            let result = read_loop(stream, &reader_handle, handler.as_ref(), settings).await;
            finish("read", &reader_handle, &reader_hub, result);
        });

        tokio::spawn(async move {
            let result = write_loop(sink, receiver, &handle, settings).await;
            handle.mark_closed();
            finish("write", &handle, &hub, result);
        });
    }
}

fn finish(side: &str, handle: &ConnectionHandle, hub: &Hub, result: Result<(), MurmurError>) {
    match result {
        Ok(()) => debug!(
            user_id = handle.user_id().0,
            connection_id = %handle.id(),
            "{side} loop finished"
        ),
        Err(e) => info!(
            user_id = handle.user_id().0,
            connection_id = %handle.id(),
            error = %e,
            "{side} loop terminated"
        ),
    }
    hub.unregister(handle);
    handle.close();
}

fn channel_error(message: &str, source: crate::frame::BoxError) -> MurmurError {
    MurmurError::Channel {
        message: message.to_string(),
        source: Some(source),
    }
}

/// Read inbound frames until the peer goes away, a deadline passes, or the
/// mailbox is closed.
pub(crate) async fn read_loop(
    mut stream: FrameStream,
    handle: &ConnectionHandle,
    handler: &dyn InboundHandler,
    settings: LoopSettings,
) -> Result<(), MurmurError> {
    let mut deadline = Instant::now() + settings.pong_wait;

    loop {
        let next = tokio::select! {
            _ = handle.closed() => return Ok(()),
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                return Err(MurmurError::Timeout {
                    duration: settings.pong_wait,
                });
            }
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(channel_error("read failed", e)),
            Ok(Some(Ok(frame))) => frame,
        };

        if frame.len() > settings.max_frame_bytes {
            return Err(MurmurError::Channel {
                message: format!(
                    "frame of {} bytes exceeds limit of {}",
                    frame.len(),
                    settings.max_frame_bytes
                ),
                source: None,
            });
        }

        match frame {
            Frame::Text(text) => handle_text(&text, handle, handler).await,
            Frame::Pong(_) => deadline = Instant::now() + settings.pong_wait,
            Frame::Close => return Ok(()),
            Frame::Binary(_) | Frame::Ping(_) => {
                debug!(connection_id = %handle.id(), "ignoring non-text frame");
            }
        }
    }
}

async fn handle_text(text: &str, handle: &ConnectionHandle, handler: &dyn InboundHandler) {
    let request: InboundFrame = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!(user_id = handle.user_id().0, error = %e, "malformed inbound frame");
            handle.offer(Envelope::invalid_message());
            return;
        }
    };

    if let Err(e) = handler.on_private_message(handle.user_id(), request).await {
        debug!(user_id = handle.user_id().0, error = %e, "private message rejected");
        handle.offer(Envelope::send_failed(e.to_string()));
    }
}

/// Drain the mailbox onto the transport and keep the peer alive with pings.
pub(crate) async fn write_loop(
    mut sink: FrameSink,
    mut receiver: MailboxReceiver,
    handle: &ConnectionHandle,
    settings: LoopSettings,
) -> Result<(), MurmurError> {
    let mut ping = tokio::time::interval_at(
        Instant::now() + settings.ping_period,
        settings.ping_period,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut burst = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = receiver.closed.cancelled() => {
                // Flush what was queued before closure, then say goodbye.
                receiver.drain_ready(&mut burst);
                if !burst.is_empty() {
                    write_burst(&mut sink, &mut burst, handle, settings.write_wait).await?;
                }
                let _ = tokio::time::timeout(settings.write_wait, sink.send(Frame::Close)).await;
                return Ok(());
            }
            envelope = receiver.rx.recv() => {
                let Some(envelope) = envelope else {
                    return Ok(());
                };
                burst.push(envelope);
                receiver.drain_ready(&mut burst);
                write_burst(&mut sink, &mut burst, handle, settings.write_wait).await?;
            }
            _ = ping.tick() => {
                match tokio::time::timeout(settings.write_wait, sink.send(Frame::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(channel_error("ping failed", e)),
                    Err(_) => return Err(MurmurError::Timeout { duration: settings.write_wait }),
                }
            }
        }
    }
}

/// Write every envelope in `burst` as its own text frame, then flush once.
async fn write_burst(
    sink: &mut FrameSink,
    burst: &mut Vec<Envelope>,
    handle: &ConnectionHandle,
    write_wait: Duration,
) -> Result<(), MurmurError> {
    let frames = burst
        .drain(..)
        .map(|envelope| {
            serde_json::to_string(&envelope)
                .map(Frame::Text)
                .map_err(|e| MurmurError::Internal(format!("envelope encoding failed: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let count = frames.len();

    let write = async {
        for frame in frames {
            sink.feed(frame).await?;
        }
        sink.flush().await
    };
    match tokio::time::timeout(write_wait, write).await {
        Ok(Ok(())) => {
            debug!(
                connection_id = %handle.id(),
                user_id = handle.user_id().0,
                count,
                "wrote envelope burst"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(channel_error("write failed", e)),
        Err(_) => Err(MurmurError::Timeout {
            duration: write_wait,
        }),
    }
}
