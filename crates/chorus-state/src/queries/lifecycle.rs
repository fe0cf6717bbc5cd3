// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daemon run bookkeeping for unclean-shutdown detection.

use chorus_core::ChorusError;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, fmt_ts, parse_ts};

/// What the previous run left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRecord {
    /// `true` when the previous run recorded a clean shutdown, or when
    /// there was no previous run.
    pub previous_clean: bool,
    pub previous_started_at: Option<DateTime<Utc>>,
}

/// Marks a new run as started and not yet cleanly stopped.
pub async fn record_start(db: &Database) -> Result<StartRecord, ChorusError> {
    let now = fmt_ts(Utc::now());
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let previous = tx
            .query_row(
                "SELECT started_at, clean FROM daemon_run WHERE id = 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        tx.execute(
            "INSERT INTO daemon_run (id, started_at, stopped_at, clean) VALUES (1, ?1, NULL, 0)
             ON CONFLICT(id) DO UPDATE SET
                started_at = excluded.started_at,
                stopped_at = NULL,
                clean = 0",
            params![now],
        )?;
        tx.commit()?;

        Ok(match previous {
            Some((started_at, clean)) => StartRecord {
                previous_clean: clean,
                previous_started_at: Some(parse_ts(&started_at)?),
            },
            None => StartRecord {
                previous_clean: true,
                previous_started_at: None,
            },
        })
    })
    .await
}

pub async fn record_shutdown(db: &Database, clean: bool) -> Result<(), ChorusError> {
    let now = fmt_ts(Utc::now());
    db.call(move |conn| {
        conn.execute(
            "UPDATE daemon_run SET stopped_at = ?1, clean = ?2 WHERE id = 1",
            params![now, clean],
        )?;
        Ok(())
    })
    .await
}

/// Whether the most recent run stopped cleanly. `true` if nothing ran yet.
pub async fn was_clean_shutdown(db: &Database) -> Result<bool, ChorusError> {
    db.call(|conn| {
        let clean = conn
            .query_row("SELECT clean FROM daemon_run WHERE id = 1", [], |row| {
                row.get::<_, bool>(0)
            })
            .optional()?;
        Ok(clean.unwrap_or(true))
    })
    .await
}
