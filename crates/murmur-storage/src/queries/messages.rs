// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and delivery-status queries.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use murmur_core::{Message, MessageId, MessageStatus, MurmurError, NewMessage, UserId, format_timestamp};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const SELECT_COLUMNS: &str = "SELECT id, sender_id, recipient_id, content, created_at, status FROM messages";

/// What a status update did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// No message has this id.
    Missing,
    /// The row already sat at or past the requested status.
    Unchanged(MessageStatus),
    /// The row moved forward from the contained status.
    Advanced(MessageStatus),
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let created_at: String = row.get(4)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    let status: String = row.get(5)?;
    let status = MessageStatus::from_str(&status)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Message {
        id: MessageId(row.get(0)?),
        sender_id: UserId(row.get(1)?),
        recipient_id: UserId(row.get(2)?),
        content: row.get(3)?,
        created_at,
        status,
    })
}

/// Insert a message and return it with its assigned id.
pub async fn insert_message(db: &Database, msg: NewMessage) -> Result<Message, MurmurError> {
    db.connection()
        .call(move |conn| -> Result<Message, rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, content, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    msg.sender_id.0,
                    msg.recipient_id.0,
                    msg.content,
                    format_timestamp(&msg.created_at),
                    msg.status.to_string(),
                ],
            )?;
            let id = MessageId(conn.last_insert_rowid());
            Ok(msg.into_message(id))
        })
        .await
        .map_err(map_tr_err)
}

/// Messages between `a` and `b` in either direction, oldest first.
pub async fn list_conversation(
    db: &Database,
    a: UserId,
    b: UserId,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, MurmurError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE (sender_id = ?1 AND recipient_id = ?2)
                    OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(params![a.0, b.0, limit, offset], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages addressed to `user` created after `since` that have not been read.
pub async fn list_undelivered(
    db: &Database,
    user: UserId,
    since: DateTime<Utc>,
) -> Result<Vec<Message>, MurmurError> {
    let since = format_timestamp(&since);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE recipient_id = ?1 AND status <> 'read' AND created_at > ?2
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![user.0, since], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Advance a message's status if `status` is a forward move.
///
/// The read and the write share one transaction so two racing updates cannot
/// move a row backward.
pub async fn update_status(
    db: &Database,
    id: MessageId,
    status: MessageStatus,
) -> Result<StatusChange, MurmurError> {
    db.connection()
        .call(move |conn| -> Result<StatusChange, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM messages WHERE id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(StatusChange::Missing);
            };
            let current = MessageStatus::from_str(&current)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

            if !current.can_advance_to(status) {
                return Ok(StatusChange::Unchanged(current));
            }
            tx.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id.0],
            )?;
            tx.commit()?;
            Ok(StatusChange::Advanced(current))
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a single message by id.
pub async fn get_message(db: &Database, id: MessageId) -> Result<Option<Message>, MurmurError> {
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(secs)
    }

    fn make_msg(from: i64, to: i64, content: &str, secs: i64) -> NewMessage {
        let mut msg = NewMessage::new(UserId(from), UserId(to), content);
        msg.created_at = at(secs);
        msg
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let (db, _dir) = setup_db().await;

        let m1 = insert_message(&db, make_msg(1, 2, "hello", 1)).await.unwrap();
        let m2 = insert_message(&db, make_msg(2, 1, "hi there", 2)).await.unwrap();
        assert!(m1.id.is_valid());
        assert!(m2.id > m1.id);
        assert_eq!(m1.status, MessageStatus::Sent);

        let stored = get_message(&db, m1.id).await.unwrap().unwrap();
        assert_eq!(stored, m1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_covers_both_directions_oldest_first() {
        let (db, _dir) = setup_db().await;

        insert_message(&db, make_msg(1, 2, "first", 1)).await.unwrap();
        insert_message(&db, make_msg(3, 1, "elsewhere", 2)).await.unwrap();
        insert_message(&db, make_msg(2, 1, "second", 3)).await.unwrap();
        insert_message(&db, make_msg(1, 2, "third", 4)).await.unwrap();

        let messages = list_conversation(&db, UserId(2), UserId(1), 10, 0)
            .await
            .unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);

        let page = list_conversation(&db, UserId(1), UserId(2), 1, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "second");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn undelivered_excludes_read_and_old_messages() {
        let (db, _dir) = setup_db().await;

        let old = insert_message(&db, make_msg(1, 2, "old", 1)).await.unwrap();
        let unread = insert_message(&db, make_msg(1, 2, "unread", 20)).await.unwrap();
        let delivered = insert_message(&db, make_msg(3, 2, "delivered", 30)).await.unwrap();
        let read = insert_message(&db, make_msg(1, 2, "read", 40)).await.unwrap();
        insert_message(&db, make_msg(2, 1, "outgoing", 50)).await.unwrap();

        update_status(&db, delivered.id, MessageStatus::Delivered).await.unwrap();
        update_status(&db, read.id, MessageStatus::Read).await.unwrap();

        let pending = list_undelivered(&db, UserId(2), at(10)).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![unread.id, delivered.id]);
        assert!(!ids.contains(&old.id));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let (db, _dir) = setup_db().await;
        let msg = insert_message(&db, make_msg(1, 2, "x", 1)).await.unwrap();

        assert_eq!(
            update_status(&db, msg.id, MessageStatus::Read).await.unwrap(),
            StatusChange::Advanced(MessageStatus::Sent)
        );
        assert_eq!(
            update_status(&db, msg.id, MessageStatus::Delivered).await.unwrap(),
            StatusChange::Unchanged(MessageStatus::Read)
        );
        assert_eq!(
            update_status(&db, msg.id, MessageStatus::Read).await.unwrap(),
            StatusChange::Unchanged(MessageStatus::Read)
        );

        let stored = get_message(&db, msg.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_update_reports_missing_row() {
        let (db, _dir) = setup_db().await;
        assert_eq!(
            update_status(&db, MessageId(404), MessageStatus::Read).await.unwrap(),
            StatusChange::Missing
        );
        db.close().await.unwrap();
    }
}
