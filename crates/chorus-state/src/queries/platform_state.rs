// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-platform connection snapshots.

use chorus_core::{ChorusError, ConnectionStatus, Platform, PlatformState};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, fmt_ts, parse_opt_ts, parse_ts};

const COLUMNS: &str = "platform, status, last_connected_at, last_message_at, last_error, \
                       last_error_at, error_count, message_count, updated_at";

/// Inserts or replaces the snapshot for `state.platform`.
pub async fn save(db: &Database, state: &PlatformState) -> Result<(), ChorusError> {
    let state = state.clone();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO platform_state (platform, status, last_connected_at, last_message_at,
                                         last_error, last_error_at, error_count, message_count,
                                         updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(platform) DO UPDATE SET
                status = excluded.status,
                last_connected_at = excluded.last_connected_at,
                last_message_at = excluded.last_message_at,
                last_error = excluded.last_error,
                last_error_at = excluded.last_error_at,
                error_count = excluded.error_count,
                message_count = excluded.message_count,
                updated_at = excluded.updated_at",
            params![
                state.platform.as_str(),
                state.status.to_string(),
                state.last_connected_at.map(fmt_ts),
                state.last_message_at.map(fmt_ts),
                state.last_error,
                state.last_error_at.map(fmt_ts),
                state.error_count as i64,
                state.message_count as i64,
                fmt_ts(state.updated_at),
            ],
        )?;
        Ok(())
    })
    .await
}

pub async fn load(db: &Database, platform: Platform) -> Result<Option<PlatformState>, ChorusError> {
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM platform_state WHERE platform = ?1"),
            params![platform.as_str()],
            from_row,
        )
        .optional()
    })
    .await
}

pub async fn load_all(db: &Database) -> Result<Vec<PlatformState>, ChorusError> {
    db.call(|conn| {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM platform_state ORDER BY platform"))?;
        let rows = stmt.query_map([], from_row)?;
        rows.collect()
    })
    .await
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<PlatformState> {
    let platform: String = row.get(0)?;
    let status: String = row.get(1)?;
    Ok(PlatformState {
        platform: parse_enum::<Platform>(0, &platform)?,
        status: parse_enum::<ConnectionStatus>(1, &status)?,
        last_connected_at: parse_opt_ts(row.get(2)?)?,
        last_message_at: parse_opt_ts(row.get(3)?)?,
        last_error: row.get(4)?,
        last_error_at: parse_opt_ts(row.get(5)?)?,
        error_count: row.get::<_, i64>(6)? as u64,
        message_count: row.get::<_, i64>(7)? as u64,
        updated_at: parse_ts(&row.get::<_, String>(8)?)?,
    })
}

/// Parses a strum-backed enum column.
pub(crate) fn parse_enum<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    value.parse().map_err(|e: strum::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}
