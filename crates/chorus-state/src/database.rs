// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management: PRAGMA setup, WAL mode, migrations and shutdown.
//!
//! All access is serialized through tokio-rusqlite's single background
//! thread. Do NOT open additional connections for writes.

use std::path::Path;
use std::time::Duration;

use chorus_core::ChorusError;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::migrations;

/// The state database handle.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens the database file, applies PRAGMAs and runs pending migrations.
    pub async fn open(path: &Path, busy_timeout: Duration) -> Result<Self, ChorusError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ChorusError::storage)?;
        let db = Self { conn };
        db.prepare(busy_timeout).await?;
        info!(path = %path.display(), "state database opened");
        Ok(db)
    }

    /// In-memory database, for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, ChorusError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ChorusError::storage)?;
        let db = Self { conn };
        db.prepare(Duration::from_secs(5)).await?;
        Ok(db)
    }

    async fn prepare(&self, busy_timeout: Duration) -> Result<(), ChorusError> {
        self.conn
            .call(move |conn| -> Result<(), ChorusError> {
                conn.busy_timeout(busy_timeout).map_err(ChorusError::storage)?;
                let mode: String = conn
                    .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                    .map_err(ChorusError::storage)?;
                conn.pragma_update(None, "synchronous", "NORMAL")
                    .map_err(ChorusError::storage)?;
                conn.pragma_update(None, "foreign_keys", "ON")
                    .map_err(ChorusError::storage)?;
                debug!(journal_mode = %mode, "state database configured");
                migrations::run_migrations(conn)
            })
            .await
            .map_err(flatten_tr_err)
    }

    /// Runs `f` on the database thread.
    pub async fn call<R, F>(&self, f: F) -> Result<R, ChorusError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(f).await.map_err(map_tr_err)
    }

    /// Checkpoints the WAL into the main file and closes the connection.
    pub async fn close(self) -> Result<(), ChorusError> {
        self.call(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        })
        .await?;
        self.conn.close().await.map_err(map_tr_err)?;
        info!("state database closed");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into `ChorusError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ChorusError {
    ChorusError::storage(e)
}

fn flatten_tr_err(e: tokio_rusqlite::Error<ChorusError>) -> ChorusError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        tokio_rusqlite::Error::ConnectionClosed => {
            ChorusError::storage("state database connection closed")
        }
        tokio_rusqlite::Error::Close((_, e)) => ChorusError::storage(e),
        other => ChorusError::storage(other.to_string()),
    }
}

/// Timestamps are stored as RFC 3339 UTC with millisecond precision, which
/// sorts lexicographically.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub fn parse_opt_ts(value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_ts).transpose()
}
