// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the MessageStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use murmur_config::model::StorageConfig;
use murmur_core::{
    HealthStatus, Message, MessageId, MessageStatus, MessageStore, MurmurError, NewMessage, UserId,
};

use crate::database::Database;
use crate::queries;
use crate::queries::messages::StatusChange;

/// SQLite-backed message store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
pub struct SqliteMessageStore {
    db: Database,
}

impl SqliteMessageStore {
    /// Open the database described by `config`, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, MurmurError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite message store initialized");
        Ok(Self { db })
    }

    /// Wrap an already-open database.
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Checkpoint the WAL and release the connection.
    pub async fn close(self) -> Result<(), MurmurError> {
        self.db.close().await
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, message: NewMessage) -> Result<Message, MurmurError> {
        let saved = queries::messages::insert_message(&self.db, message).await?;
        debug!(
            message_id = saved.id.0,
            sender_id = saved.sender_id.0,
            recipient_id = saved.recipient_id.0,
            "message stored"
        );
        Ok(saved)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>, MurmurError> {
        queries::messages::get_message(&self.db, id).await
    }

    async fn list_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, MurmurError> {
        queries::messages::list_conversation(&self.db, a, b, limit, offset).await
    }

    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), MurmurError> {
        match queries::messages::update_status(&self.db, id, status).await? {
            StatusChange::Missing => Err(MurmurError::NotFound { message_id: id.0 }),
            StatusChange::Unchanged(current) => {
                debug!(message_id = id.0, %current, requested = %status, "status unchanged");
                Ok(())
            }
            StatusChange::Advanced(previous) => {
                debug!(message_id = id.0, from = %previous, to = %status, "status advanced");
                Ok(())
            }
        }
    }

    async fn list_undelivered(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, MurmurError> {
        queries::messages::list_undelivered(&self.db, user, since).await
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        let ping = self
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }
}
