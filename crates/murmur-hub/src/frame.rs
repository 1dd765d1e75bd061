// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport-neutral frames and the duplex transport a connection runs over.
//!
//! The gateway adapts axum's WebSocket to this shape; tests use in-memory
//! channels. Nothing in the hub depends on a concrete socket type.

use std::pin::Pin;

use futures::{Sink, SinkExt, Stream, StreamExt};

/// Boxed transport error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single frame on the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    /// Payload size in bytes, used for the inbound frame limit.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = BoxError> + Send>>;

/// Inbound half of a transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, BoxError>> + Send>>;

/// A negotiated duplex channel bound to nobody yet.
pub struct Transport {
    pub(crate) sink: FrameSink,
    pub(crate) stream: FrameStream,
}

impl Transport {
    /// Wrap any frame sink and stream pair, boxing their errors.
    pub fn new<Si, St, SiErr, StErr>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Frame, Error = SiErr> + Send + 'static,
        SiErr: Into<BoxError> + 'static,
        St: Stream<Item = Result<Frame, StErr>> + Send + 'static,
        StErr: Into<BoxError> + 'static,
    {
        Self {
            sink: Box::pin(sink.sink_map_err(Into::<BoxError>::into)),
            stream: Box::pin(stream.map(|item| item.map_err(Into::<BoxError>::into))),
        }
    }

    pub(crate) fn split(self) -> (FrameSink, FrameStream) {
        (self.sink, self.stream)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    #[test]
    fn frame_len_counts_payload_bytes() {
        assert_eq!(Frame::Text("héllo".into()).len(), 6);
        assert_eq!(Frame::Binary(vec![0; 3]).len(), 3);
        assert!(Frame::Close.is_empty());
    }

    #[tokio::test]
    async fn transport_wraps_channel_pairs() {
        let (out_tx, mut out_rx) = mpsc::unbounded::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Frame, BoxError>>();
        let (mut sink, mut stream) = Transport::new(out_tx, in_rx).split();

        sink.send(Frame::Text("up".into())).await.unwrap();
        assert_eq!(out_rx.next().await, Some(Frame::Text("up".into())));

        in_tx.unbounded_send(Ok(Frame::Pong(vec![]))).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Frame::Pong(vec![]));
    }
}
