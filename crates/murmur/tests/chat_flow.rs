// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end chat flow over the SQLite store: send, offline replay,
//! live delivery, read receipts, reconnection, and history over HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use murmur_config::{HubConfig, StorageConfig};
use murmur_core::{Message, MessageId, MessageStatus, MessageStore, UserId};
use murmur_gateway::{GatewayState, TokenAuthority, router};
use murmur_hub::{ConversationService, Envelope, Hub};
use murmur_storage::SqliteMessageStore;
use murmur_test_utils::{MockPeer, MockTransport};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

struct Stack {
    _dir: tempfile::TempDir,
    store: Arc<SqliteMessageStore>,
    hub: Arc<Hub>,
    service: Arc<ConversationService>,
}

async fn stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("murmur.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    let store = Arc::new(SqliteMessageStore::open(&config).await.unwrap());
    let hub = Arc::new(Hub::new(store.clone()));
    let service = Arc::new(ConversationService::new(
        Arc::clone(&hub),
        store.clone(),
        HubConfig::default(),
    ));
    Stack {
        _dir: dir,
        store,
        hub,
        service,
    }
}

impl Stack {
    async fn connect(&self, user: i64) -> MockPeer {
        let (transport, peer) = MockTransport::pair();
        self.service
            .handle_new_connection(UserId(user), transport)
            .await
            .unwrap();
        peer
    }

    async fn conversation(&self) -> Vec<Message> {
        self.store
            .list_conversation(UserId(1), UserId(2), 100, 0)
            .await
            .unwrap()
    }

    async fn wait_for(&self, id: MessageId, status: MessageStatus) -> bool {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Ok(Some(m)) = self.store.get_message(id).await
                    && m.status == status
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    async fn wait_for_count(&self, count: usize) -> Vec<Message> {
        tokio::time::timeout(WAIT, async {
            loop {
                let messages = self.conversation().await;
                if messages.len() >= count {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("messages were not persisted in time")
    }
}

#[tokio::test]
async fn hi_from_one_to_two_survives_offline_and_reconnect() {
    let stack = stack().await;

    // User 1 sends "hi" while user 2 is offline.
    let peer1 = stack.connect(1).await;
    assert!(peer1.send_private(2, "hi"));
    let stored = stack.wait_for_count(1).await;
    let hi = stored[0].clone();
    assert_eq!(hi.sender_id, UserId(1));
    assert_eq!(hi.recipient_id, UserId(2));
    assert_eq!(hi.content, "hi");
    assert_eq!(hi.status, MessageStatus::Sent);

    // User 2 connects and gets it replayed; replay does not mark it delivered.
    let mut peer2 = stack.connect(2).await;
    match peer2.next_envelope().await {
        Some(Envelope::OfflineMessage(chat)) => {
            assert_eq!(chat.id, hi.id);
            assert_eq!(chat.content, "hi");
            assert_eq!(chat.status, MessageStatus::Sent);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        stack.store.get_message(hi.id).await.unwrap().unwrap().status,
        MessageStatus::Sent
    );

    // A live message while user 2 is online becomes delivered.
    assert!(peer1.send_private(2, "again"));
    let again = match peer2.next_envelope().await {
        Some(Envelope::NewPrivateMessage(chat)) => chat,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(again.content, "again");
    assert!(stack.wait_for(again.id, MessageStatus::Delivered).await);

    // Reading both clears the backlog; a reconnect replays nothing.
    stack.service.mark_read(hi.id, UserId(2)).await.unwrap();
    stack.service.mark_read(again.id, UserId(2)).await.unwrap();
    stack.service.mark_read(hi.id, UserId(2)).await.unwrap();

    let mut peer2b = stack.connect(2).await;
    assert!(peer2.expect_close().await);
    assert!(peer2b.drain_envelopes(QUIET).await.is_empty());
    assert_eq!(stack.hub.online_count(), 2);

    let statuses: Vec<_> = stack.conversation().await.iter().map(|m| m.status).collect();
    assert_eq!(statuses, vec![MessageStatus::Read, MessageStatus::Read]);
}

#[tokio::test]
async fn self_message_is_rejected_in_band_and_not_stored() {
    let stack = stack().await;
    let mut peer1 = stack.connect(1).await;
    assert!(peer1.send_private(1, "me"));
    match peer1.next_envelope().await {
        Some(Envelope::MessageSendFailed(payload)) => {
            assert!(payload.message.contains("same"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(
        stack
            .store
            .list_conversation(UserId(1), UserId(1), 10, 0)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn history_endpoint_reads_from_sqlite() {
    let stack = stack().await;
    stack
        .service
        .submit_message(UserId(1), UserId(2), "one".into())
        .await
        .unwrap();
    stack
        .service
        .submit_message(UserId(2), UserId(1), "two".into())
        .await
        .unwrap();

    let authority = TokenAuthority::new("chat-flow-secret-0123", Duration::from_secs(60));
    let token = authority.issue(UserId(2)).unwrap();
    let state = GatewayState::new(
        Arc::clone(&stack.service),
        stack.store.clone(),
        Arc::new(authority),
        &HubConfig::default(),
    );

    let request = Request::builder()
        .uri("/api/chat/history?with_user_id=1")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let contents: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(contents, vec!["one", "two"]);
}
