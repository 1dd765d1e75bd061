// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint for private messaging.
//!
//! Client -> Server (JSON):
//! ```json
//! {"recipientid": 2, "content": "hi"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "new_private_message", "payload": {"id": 1, "senderid": 1, "recipientid": 2, "content": "hi", "timestamp": "...", "status": "sent"}}
//! {"type": "error", "payload": {"code": "invalid_message", "message": "Invalid message format"}}
//! {"type": "message_send_failed", "payload": {"code": "send_error", "message": "..."}}
//! ```
//!
//! The socket is adapted to a hub [`Transport`] and handed to the
//! conversation service, which owns it from then on.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, future};

use murmur_core::UserId;
use murmur_hub::{Frame, Transport};

use crate::auth::AuthUser;
use crate::server::GatewayState;

/// GET /api/chat/ws
///
/// Authenticates before upgrading, so a bad token gets a plain 401.
pub async fn ws_handler(
    AuthUser(user): AuthUser,
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::debug!(user_id = user.0, "websocket upgrade requested");
    ws.max_message_size(state.max_frame_bytes)
        .on_failed_upgrade(move |e| {
            tracing::warn!(user_id = user.0, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, user, state))
}

async fn handle_socket(socket: WebSocket, user: UserId, state: GatewayState) {
    let transport = into_transport(socket);
    if let Err(e) = state.service.handle_new_connection(user, transport).await {
        tracing::warn!(user_id = user.0, error = %e, "failed to attach connection");
    }
}

/// Wrap an upgraded socket as a frame transport.
pub fn into_transport(socket: WebSocket) -> Transport {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.map(|item| item.map(to_frame));
    Transport::new(sink, stream)
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(data) => Frame::Ping(data.to_vec()),
        Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_map_both_ways() {
        let frames = [
            Frame::Text("hi".into()),
            Frame::Binary(vec![1, 2]),
            Frame::Ping(vec![3]),
            Frame::Pong(vec![]),
            Frame::Close,
        ];
        for frame in frames {
            assert_eq!(to_frame(to_message(frame.clone())), frame);
        }
    }

    #[test]
    fn close_with_reason_is_a_close_frame() {
        let close = Message::Close(Some(axum::extract::ws::CloseFrame {
            code: 1000,
            reason: "bye".into(),
        }));
        assert_eq!(to_frame(close), Frame::Close);
    }
}
