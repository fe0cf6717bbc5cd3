// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only, date-partitioned event log.
//!
//! One JSON object per line in `events/YYYY-MM-DD.jsonl`, partitioned by
//! the UTC date the event was written. Every append is flushed and synced
//! before it is acknowledged.

use std::path::{Path, PathBuf};

use chorus_core::{
    AccountId, ChorusError, Identity, MessageId, MessageKind, Platform, ThreadId, ThreadKind,
    ThreadSource,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Something that happened to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    AccountCreated {
        id: AccountId,
        display_name: String,
        identity: Identity,
        is_self: bool,
        created_at: DateTime<Utc>,
    },
    AccountIdentityAdded {
        id: AccountId,
        identity: Identity,
    },
    AccountRenamed {
        id: AccountId,
        display_name: String,
    },
    ThreadCreated {
        id: ThreadId,
        title: String,
        kind: ThreadKind,
        source: ThreadSource,
        participants: Vec<AccountId>,
        created_at: DateTime<Utc>,
    },
    ThreadParticipantsAdded {
        id: ThreadId,
        participants: Vec<AccountId>,
    },
    MessageCreated {
        id: MessageId,
        account_id: AccountId,
        thread_id: ThreadId,
        created_at: DateTime<Utc>,
        imported_at: DateTime<Utc>,
        platform: Platform,
        kind: MessageKind,
        platform_id: String,
    },
}

/// A log line: the event plus the time it was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: StoreEvent,
}

/// Appends to the current day's partition.
///
/// Not synchronized; the store keeps it behind a `tokio::sync::Mutex`.
pub struct EventLog {
    dir: PathBuf,
    current: Option<(NaiveDate, File)>,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one entry durably. On error nothing is acknowledged and the
    /// partition handle is dropped so the next append reopens it.
    pub async fn append(&mut self, entry: &LogEntry) -> Result<(), ChorusError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let date = entry.at.date_naive();
        let result = self.write_line(date, &line).await;
        if result.is_err() {
            self.current = None;
        }
        result
    }

    async fn write_line(&mut self, date: NaiveDate, line: &[u8]) -> Result<(), ChorusError> {
        if !matches!(&self.current, Some((d, _)) if *d == date) {
            fs::create_dir_all(&self.dir).await?;
            let path = partition_path(&self.dir, date);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            debug!(path = %path.display(), "opened event log partition");
            self.current = Some((date, file));
        }

        let Some((_, file)) = self.current.as_mut() else {
            return Err(ChorusError::Internal("event log partition not open".into()));
        };
        file.write_all(line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

fn partition_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
}

/// Reads every partition in date order.
///
/// A torn trailing line (crash mid-append) is skipped with a warning and
/// truncated away so later appends start on a clean line. Any other
/// unparseable line is a storage error.
pub async fn replay(dir: &Path) -> Result<Vec<LogEntry>, ChorusError> {
    let mut partitions = Vec::new();
    match fs::read_dir(dir).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "jsonl") {
                    partitions.push(path);
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    }
    partitions.sort();

    let mut out = Vec::new();
    for path in partitions {
        replay_partition(&path, &mut out).await?;
    }
    Ok(out)
}

async fn replay_partition(path: &Path, out: &mut Vec<LogEntry>) -> Result<(), ChorusError> {
    let content = fs::read(path).await?;
    let mut good_len = 0usize;
    let mut rest = content.as_slice();

    while !rest.is_empty() {
        let (line, consumed, terminated) = match rest.iter().position(|b| *b == b'\n') {
            Some(i) => (&rest[..i], i + 1, true),
            None => (rest, rest.len(), false),
        };
        rest = &rest[consumed..];
        let is_last = rest.is_empty();

        if line.iter().all(u8::is_ascii_whitespace) {
            good_len += consumed;
            continue;
        }

        match serde_json::from_slice::<LogEntry>(line) {
            Ok(entry) if terminated => {
                out.push(entry);
                good_len += consumed;
            }
            Err(e) if !is_last => {
                return Err(ChorusError::storage(format!(
                    "corrupt event log line in {} at byte {good_len}: {e}",
                    path.display()
                )));
            }
            _ => {
                warn!(
                    path = %path.display(),
                    bytes = line.len(),
                    "skipping torn trailing event log line"
                );
                truncate(path, good_len as u64).await?;
            }
        }
    }
    Ok(())
}

async fn truncate(path: &Path, len: u64) -> Result<(), ChorusError> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_data().await?;
    Ok(())
}
