// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::time::Duration;

use murmur_core::MurmurError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// How long SQLite waits on a locked database before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MurmurError {
    MurmurError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection backing the message store.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, MurmurError> {
        Self::open_with(path, true).await
    }

    /// Open the database at `path`, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, MurmurError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| MurmurError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and `check-config`.
    pub async fn open_in_memory() -> Result<Self, MurmurError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| MurmurError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), MurmurError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(%mode, "journal mode set");
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| -> Result<(), MurmurError> { run_migrations(conn) })
            .await
            .map_err(|e| MurmurError::storage(e.to_string()))?;
        debug!("migrations up to date");
        Ok(())
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), MurmurError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| MurmurError::storage(e.to_string()))?;
        debug!("database closed");
        Ok(())
    }
}
