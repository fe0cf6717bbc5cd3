// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync progress: typed watermarks per `(platform, source, scope)` and the
//! legacy single-value cursor.

use chorus_core::{ChorusError, Platform, SyncMetadata, SyncState, Watermark};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::database::{Database, fmt_ts, parse_ts};
use crate::queries::platform_state::parse_enum;

const COLUMNS: &str =
    "id, platform, source, scope, watermark_kind, watermark_value, metadata, updated_at";

/// Saves a watermark unless it would move progress backwards.
///
/// Timestamp and sequence watermarks are monotonic; a stale save is
/// ignored and reported as `false`. Cursor tokens always replace.
pub async fn save_state(db: &Database, state: &SyncState) -> Result<bool, ChorusError> {
    let state = state.clone();
    let metadata = serde_json::to_string(&state.metadata)?;
    let id = SyncState::key(state.platform, &state.source, &state.scope);

    db.call(move |conn| {
        let tx = conn.transaction()?;
        let current = tx
            .query_row(
                "SELECT watermark_kind, watermark_value FROM sync_state
                 WHERE platform = ?1 AND source = ?2 AND scope = ?3",
                params![state.platform.as_str(), state.source, state.scope],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        if let Some((kind, value)) = current
            && let Ok(current) = Watermark::decode(&kind, &value)
            && state.watermark.is_behind(&current)
        {
            debug!(
                sync_state = %id,
                current = %value,
                rejected = %state.watermark.encode_value(),
                "ignoring stale watermark"
            );
            tx.commit()?;
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO sync_state (id, platform, source, scope, watermark_kind,
                                     watermark_value, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(platform, source, scope) DO UPDATE SET
                watermark_kind = excluded.watermark_kind,
                watermark_value = excluded.watermark_value,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![
                id,
                state.platform.as_str(),
                state.source,
                state.scope,
                state.watermark.kind(),
                state.watermark.encode_value(),
                metadata,
                fmt_ts(state.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    })
    .await
}

pub async fn load_state(
    db: &Database,
    platform: Platform,
    source: &str,
    scope: &str,
) -> Result<Option<SyncState>, ChorusError> {
    let (source, scope) = (source.to_string(), scope.to_string());
    db.call(move |conn| {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM sync_state
                 WHERE platform = ?1 AND source = ?2 AND scope = ?3"
            ),
            params![platform.as_str(), source, scope],
            from_row,
        )
        .optional()
    })
    .await
}

pub async fn load_platform_states(
    db: &Database,
    platform: Platform,
) -> Result<Vec<SyncState>, ChorusError> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM sync_state WHERE platform = ?1 ORDER BY source, scope"
        ))?;
        let rows = stmt.query_map(params![platform.as_str()], from_row)?;
        rows.collect()
    })
    .await
}

pub async fn save_cursor(db: &Database, platform: Platform, cursor: &str) -> Result<(), ChorusError> {
    let cursor = cursor.to_string();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO sync_cursor (platform, cursor, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(platform) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at",
            params![platform.as_str(), cursor, fmt_ts(Utc::now())],
        )?;
        Ok(())
    })
    .await
}

pub async fn load_cursor(db: &Database, platform: Platform) -> Result<Option<String>, ChorusError> {
    db.call(move |conn| {
        conn.query_row(
            "SELECT cursor FROM sync_cursor WHERE platform = ?1",
            params![platform.as_str()],
            |row| row.get(0),
        )
        .optional()
    })
    .await
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<SyncState> {
    let platform: String = row.get(1)?;
    let kind: String = row.get(4)?;
    let value: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    Ok(SyncState {
        id: row.get(0)?,
        platform: parse_enum(1, &platform)?,
        source: row.get(2)?,
        scope: row.get(3)?,
        watermark: Watermark::decode(&kind, &value).map_err(|e| conversion(5, e))?,
        metadata: serde_json::from_str::<SyncMetadata>(&metadata).map_err(|e| conversion(6, e))?,
        updated_at: parse_ts(&row.get::<_, String>(7)?)?,
    })
}

fn conversion(
    column: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
}
