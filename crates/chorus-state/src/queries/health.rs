// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling health check history.

use chorus_core::{ChorusError, HealthCheckRecord, Platform};
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use crate::database::{Database, fmt_ts, parse_ts};
use crate::queries::platform_state::parse_enum;

/// Records one check and prunes the platform's history to `retain` rows.
pub async fn record(
    db: &Database,
    platform: Platform,
    healthy: bool,
    connected: bool,
    issues: &[String],
    retain: u32,
) -> Result<HealthCheckRecord, ChorusError> {
    let issues_json = serde_json::to_string(issues)?;
    let issues = issues.to_vec();
    let checked_at = Utc::now();
    let checked_at_str = fmt_ts(checked_at);

    let id = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO health_check (platform, healthy, connected, issues, checked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![platform.as_str(), healthy, connected, issues_json, checked_at_str],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "DELETE FROM health_check
                 WHERE platform = ?1
                   AND id NOT IN (SELECT id FROM health_check WHERE platform = ?1
                                  ORDER BY id DESC LIMIT ?2)",
                params![platform.as_str(), retain],
            )?;
            tx.commit()?;
            Ok(id)
        })
        .await?;

    Ok(HealthCheckRecord {
        id,
        platform,
        healthy,
        connected,
        issues,
        checked_at,
    })
}

/// Most recent checks for `platform`, newest first.
pub async fn recent(
    db: &Database,
    platform: Platform,
    limit: u32,
) -> Result<Vec<HealthCheckRecord>, ChorusError> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, platform, healthy, connected, issues, checked_at FROM health_check
             WHERE platform = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![platform.as_str(), limit], from_row)?;
        rows.collect()
    })
    .await
}

/// Checks at or after `since` that found `platform` not connected.
///
/// Checks failed only by the error threshold itself are not counted, so
/// the count drains once the failures leave the window.
pub async fn count_connection_failures_since(
    db: &Database,
    platform: Platform,
    since: DateTime<Utc>,
) -> Result<u32, ChorusError> {
    let since = fmt_ts(since);
    db.call(move |conn| {
        conn.query_row(
            "SELECT COUNT(*) FROM health_check
             WHERE platform = ?1 AND connected = 0 AND checked_at >= ?2",
            params![platform.as_str(), since],
            |row| row.get(0),
        )
    })
    .await
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<HealthCheckRecord> {
    let platform: String = row.get(1)?;
    let issues: String = row.get(4)?;
    Ok(HealthCheckRecord {
        id: row.get(0)?,
        platform: parse_enum(1, &platform)?,
        healthy: row.get(2)?,
        connected: row.get(3)?,
        issues: serde_json::from_str(&issues).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        checked_at: parse_ts(&row.get::<_, String>(5)?)?,
    })
}
