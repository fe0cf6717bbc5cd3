// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed search index.

use std::path::Path;
use std::str::FromStr;

use chorus_core::{ChorusError, Message, ThreadId};
use chorus_store::ContentStore;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use tracing::{debug, info, warn};

use crate::migrations;
use crate::query::{SearchFilters, SearchHit, fts_expression};

const REBUILD_BATCH: usize = 500;

const HIT_COLUMNS: &str = "m.id, m.platform, m.kind, m.thread_id, m.author_name, \
     m.author_handle, m.subject, m.content, m.created_at";

const INSERT_SQL: &str = "INSERT OR IGNORE INTO messages \
     (id, platform, kind, thread_id, account_id, author_name, author_handle, \
      subject, content, created_at, created_at_ms) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

/// Full-text index over messages. Writes are idempotent by message id.
pub struct SearchIndex {
    conn: tokio_rusqlite::Connection,
}

impl SearchIndex {
    /// Opens (or creates) the index database at `path`.
    pub async fn open(path: &Path) -> Result<Self, ChorusError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ChorusError::storage)?;
        let index = Self { conn };
        index.prepare().await?;
        info!(path = %path.display(), "search index opened");
        Ok(index)
    }

    pub async fn open_in_memory() -> Result<Self, ChorusError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ChorusError::storage)?;
        let index = Self { conn };
        index.prepare().await?;
        Ok(index)
    }

    async fn prepare(&self) -> Result<(), ChorusError> {
        self.conn
            .call(|conn| -> Result<(), ChorusError> {
                let _: String = conn
                    .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                    .map_err(ChorusError::storage)?;
                conn.pragma_update(None, "synchronous", "NORMAL")
                    .map_err(ChorusError::storage)?;
                migrations::run_migrations(conn)
            })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => ChorusError::storage(other.to_string()),
            })
    }

    async fn call<R, F>(&self, f: F) -> Result<R, ChorusError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(f).await.map_err(ChorusError::storage)
    }

    /// Indexes one message. Returns `false` if it was already present.
    pub async fn index(&self, message: &Message) -> Result<bool, ChorusError> {
        let row = IndexRow::from(message);
        self.call(move |conn| row.insert(conn).map(|n| n > 0)).await
    }

    /// Indexes a batch inside one transaction. Returns the number of new rows.
    pub async fn index_batch(&self, messages: &[Message]) -> Result<usize, ChorusError> {
        if messages.is_empty() {
            return Ok(0);
        }
        let rows: Vec<IndexRow> = messages.iter().map(IndexRow::from).collect();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            for row in &rows {
                inserted += row.insert(&tx)?;
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    /// Ranked full-text search. Blank or punctuation-only queries match nothing.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, ChorusError> {
        let Some(expression) = fts_expression(query) else {
            return Ok(Vec::new());
        };

        let mut sql = format!(
            "SELECT {HIT_COLUMNS}, \
                    snippet(messages_fts, 0, '[', ']', '...', 12), \
                    bm25(messages_fts) \
             FROM messages_fts JOIN messages m ON m.rowid = messages_fts.rowid \
             WHERE messages_fts MATCH ?1"
        );
        let mut params = vec![Value::Text(expression)];
        push_filters(&mut sql, &mut params, filters);
        params.push(Value::Integer(filters.limit() as i64));
        sql.push_str(&format!(
            " ORDER BY bm25(messages_fts), m.created_at_ms DESC LIMIT ?{}",
            params.len()
        ));

        self.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                let mut hit = hit_from_row(row)?;
                hit.snippet = row.get(9)?;
                let rank: f64 = row.get(10)?;
                hit.score = -rank;
                Ok(hit)
            })?;
            rows.collect()
        })
        .await
    }

    /// Most recent messages across all threads, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<SearchHit>, ChorusError> {
        let sql = format!(
            "SELECT {HIT_COLUMNS} FROM messages m \
             ORDER BY m.created_at_ms DESC, m.id LIMIT ?1"
        );
        self.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([limit as i64], hit_from_row)?;
            rows.collect()
        })
        .await
    }

    /// The newest `limit` messages of a thread, in chronological order.
    pub async fn thread_messages(
        &self,
        thread_id: &ThreadId,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ChorusError> {
        let sql = format!(
            "SELECT * FROM ( \
                 SELECT {HIT_COLUMNS}, m.created_at_ms AS ms FROM messages m \
                 WHERE m.thread_id = ?1 \
                 ORDER BY m.created_at_ms DESC, m.id DESC LIMIT ?2 \
             ) ORDER BY ms ASC, id ASC"
        );
        let thread_id = thread_id.as_str().to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![thread_id, limit as i64], hit_from_row)?;
            rows.collect()
        })
        .await
    }

    pub async fn count(&self) -> Result<u64, ChorusError> {
        self.call(|conn| conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0)))
            .await
    }

    /// Drops every indexed row.
    pub async fn remove_all(&self) -> Result<(), ChorusError> {
        self.call(|conn| {
            conn.execute_batch(
                "DELETE FROM messages; \
                 INSERT INTO messages_fts(messages_fts) VALUES('rebuild');",
            )
        })
        .await
    }

    /// Clears the index and repopulates it from every message in `store`.
    ///
    /// Messages whose blob cannot be read are skipped with a warning.
    pub async fn rebuild(&self, store: &ContentStore) -> Result<usize, ChorusError> {
        self.remove_all().await?;
        let indexed = self.index_store(store).await?;
        info!(indexed, "search index rebuilt");
        Ok(indexed)
    }

    /// Indexes stored messages missing from the index, keeping existing
    /// rows. Does nothing when the index already holds as many rows as the
    /// store holds messages.
    pub async fn catch_up(&self, store: &ContentStore) -> Result<usize, ChorusError> {
        let indexed = self.count().await?;
        let stored = store.stats().messages;
        if indexed >= stored {
            return Ok(0);
        }
        let added = self.index_store(store).await?;
        info!(added, missing = stored - indexed, "search index caught up with the store");
        Ok(added)
    }

    async fn index_store(&self, store: &ContentStore) -> Result<usize, ChorusError> {
        let metas = store.messages(None);
        let mut batch = Vec::with_capacity(REBUILD_BATCH);
        let mut indexed = 0;
        for meta in metas {
            match store.get_message(&meta.id).await {
                Ok(Some(message)) => batch.push(message),
                Ok(None) => warn!(id = %meta.id, "message blob missing during reindex"),
                Err(e) => warn!(id = %meta.id, error = %e, "failed to read message during reindex"),
            }
            if batch.len() >= REBUILD_BATCH {
                indexed += self.index_batch(&batch).await?;
                batch.clear();
            }
        }
        indexed += self.index_batch(&batch).await?;
        Ok(indexed)
    }

    pub async fn close(self) -> Result<(), ChorusError> {
        self.conn.close().await.map_err(ChorusError::storage)?;
        debug!("search index closed");
        Ok(())
    }
}

fn push_filters(sql: &mut String, params: &mut Vec<Value>, filters: &SearchFilters) {
    let mut clause = |column: &str, op: &str, value: Value| {
        params.push(value);
        sql.push_str(&format!(" AND {column} {op} ?{}", params.len()));
    };
    if let Some(platform) = filters.platform {
        clause("m.platform", "=", Value::Text(platform.as_str().into()));
    }
    if let Some(kind) = filters.kind {
        clause("m.kind", "=", Value::Text(kind.as_str().into()));
    }
    if let Some(since) = filters.since {
        clause("m.created_at_ms", ">=", Value::Integer(since.timestamp_millis()));
    }
    if let Some(until) = filters.until {
        clause("m.created_at_ms", "<", Value::Integer(until.timestamp_millis()));
    }
    if let Some(thread) = &filters.thread {
        clause("m.thread_id", "=", Value::Text(thread.as_str().into()));
    }
}

/// Owned column values for one `messages` row.
struct IndexRow {
    id: String,
    platform: &'static str,
    kind: &'static str,
    thread_id: String,
    account_id: String,
    author_name: String,
    author_handle: String,
    subject: String,
    content: String,
    created_at: String,
    created_at_ms: i64,
}

impl From<&Message> for IndexRow {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.as_str().to_string(),
            platform: message.source.platform.as_str(),
            kind: message.kind.as_str(),
            thread_id: message.refs.thread_id.as_str().to_string(),
            account_id: message.account_id.as_str().to_string(),
            author_name: message.author.name.clone(),
            author_handle: message.author.handle.clone(),
            subject: message
                .tags
                .get(chorus_core::Tags::SUBJECT)
                .unwrap_or_default()
                .to_string(),
            content: message.content.clone(),
            created_at: message
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            created_at_ms: message.created_at.timestamp_millis(),
        }
    }
}

impl IndexRow {
    fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
        conn.prepare_cached(INSERT_SQL)?.execute(rusqlite::params![
            self.id,
            self.platform,
            self.kind,
            self.thread_id,
            self.account_id,
            self.author_name,
            self.author_handle,
            self.subject,
            self.content,
            self.created_at,
            self.created_at_ms,
        ])
    }
}

fn hit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    let subject: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    Ok(SearchHit {
        id: row.get::<_, String>(0)?.into(),
        platform: parse_column(row, 1)?,
        kind: parse_column(row, 2)?,
        thread_id: row.get::<_, String>(3)?.into(),
        author_name: row.get(4)?,
        author_handle: row.get(5)?,
        subject: (!subject.is_empty()).then_some(subject),
        content: row.get(7)?,
        snippet: String::new(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| conversion_error(8, e))?,
        score: 0.0,
    })
}

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
