// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory duplex transport for deterministic connection tests.
//!
//! `MockTransport::pair()` returns the server-side [`Transport`] handed to the
//! hub and a [`MockPeer`] playing the remote client.

use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::FusedStream;
use murmur_hub::{BoxError, Envelope, Frame, Transport};

/// How long `MockPeer` waits for a frame before giving up.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Factory for in-memory transports.
pub struct MockTransport;

impl MockTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (Transport, MockPeer) {
        let (to_server, server_in) = mpsc::unbounded::<Result<Frame, BoxError>>();
        let (server_out, from_server) = mpsc::unbounded::<Frame>();
        (
            Transport::new(server_out, server_in),
            MockPeer {
                to_server: Some(to_server),
                from_server,
            },
        )
    }
}

/// The remote end of a [`MockTransport`].
pub struct MockPeer {
    to_server: Option<mpsc::UnboundedSender<Result<Frame, BoxError>>>,
    from_server: mpsc::UnboundedReceiver<Frame>,
}

impl MockPeer {
    /// Push a raw frame to the server. Returns `false` once the server stopped reading.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.to_server
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(Ok(frame)).is_ok())
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(Frame::Text(text.into()))
    }

    /// Send a private message request to `recipient`.
    pub fn send_private(&self, recipient: i64, content: &str) -> bool {
        self.send_text(
            serde_json::json!({"recipientid": recipient, "content": content}).to_string(),
        )
    }

    pub fn send_pong(&self) -> bool {
        self.send_frame(Frame::Pong(Vec::new()))
    }

    /// Inject a transport-level read error.
    pub fn fail(&self, message: &str) -> bool {
        let err: BoxError = message.to_string().into();
        self.to_server
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(Err(err)).is_ok())
    }

    /// End the inbound stream, as if the client vanished.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Stop accepting frames from the server; its next write fails.
    pub fn stop_reading(&mut self) {
        self.from_server.close();
    }

    /// Next frame from the server, or `None` on timeout or closure.
    pub async fn next_frame_within(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.from_server.next())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.next_frame_within(DEFAULT_RECV_TIMEOUT).await
    }

    /// Next envelope from the server, skipping keepalive pings.
    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.next_frame().await? {
                Frame::Text(text) => return serde_json::from_str(&text).ok(),
                Frame::Ping(_) => continue,
                _ => return None,
            }
        }
    }

    /// Collect envelopes until none arrives within `quiet`.
    pub async fn drain_envelopes(&mut self, quiet: Duration) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Some(frame) = self.next_frame_within(quiet).await {
            if let Frame::Text(text) = frame
                && let Ok(envelope) = serde_json::from_str(&text)
            {
                envelopes.push(envelope);
            }
        }
        envelopes
    }

    /// Wait until the server sends a close frame or drops its end.
    pub async fn expect_close(&mut self) -> bool {
        loop {
            match self.next_frame().await {
                Some(Frame::Close) => return true,
                Some(_) => continue,
                None => return self.from_server.is_terminated(),
            }
        }
    }
}
