// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`PollSource`] over JSONL files dropped by external sync clients.
//!
//! Layout: `<root>/*.jsonl` for the single default scope, or
//! `<root>/<scope>/*.jsonl` when scopes are configured. Files are consumed
//! in name order; the watermark is an opaque `file:offset` cursor pointing
//! just past the last complete line read. A line still being written (no
//! trailing newline) is left for the next poll, and later files wait until
//! it is finished.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chorus_core::{ChorusError, Watermark};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, warn};

use crate::poller::{PollBatch, PollSource};

pub const DEFAULT_SCOPE: &str = "all";
const DEFAULT_BATCH_LIMIT: usize = 1000;

pub struct SpoolSource<R> {
    root: PathBuf,
    scopes: Vec<String>,
    batch_limit: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R> SpoolSource<R> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scopes: Vec::new(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            _record: PhantomData,
        }
    }

    /// One subdirectory per scope instead of a flat spool.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope_dir(&self, scope: &str) -> PathBuf {
        if self.scopes.is_empty() {
            self.root.clone()
        } else {
            self.root.join(scope)
        }
    }
}

/// Position inside the spool: a file name and a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SpoolCursor {
    file: String,
    offset: u64,
}

impl SpoolCursor {
    fn parse(value: &str) -> Option<Self> {
        let (file, offset) = value.rsplit_once(':')?;
        Some(Self {
            file: file.to_string(),
            offset: offset.parse().ok()?,
        })
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.file, self.offset)
    }
}

#[async_trait]
impl<R> PollSource for SpoolSource<R>
where
    R: DeserializeOwned + Send + 'static,
{
    type Record = R;

    fn source(&self) -> &str {
        "spool"
    }

    fn scopes(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            vec![DEFAULT_SCOPE.to_string()]
        } else {
            self.scopes.clone()
        }
    }

    async fn connect(&self) -> Result<(), ChorusError> {
        for scope in self.scopes() {
            tokio::fs::create_dir_all(self.scope_dir(&scope)).await?;
        }
        Ok(())
    }

    async fn poll(&self, scope: &str, since: Option<&Watermark>) -> Result<PollBatch<R>, ChorusError> {
        let cursor = match since {
            Some(Watermark::Cursor(value)) => SpoolCursor::parse(value).or_else(|| {
                warn!(cursor = %value, "unreadable spool cursor, rescanning from the start");
                None
            }),
            Some(other) => {
                warn!(kind = other.kind(), "unexpected spool watermark kind, rescanning");
                None
            }
            None => None,
        };

        let dir = self.scope_dir(scope);
        let files = list_spool_files(&dir).await?;

        let mut batch = PollBatch::empty();
        let mut position: Option<SpoolCursor> = None;
        let mut skipped = 0u64;

        for file in files {
            let start = match &cursor {
                Some(c) if file < c.file => continue,
                Some(c) if file == c.file => c.offset,
                _ => 0,
            };
            let remaining = self.batch_limit - batch.records.len();
            let read = read_lines::<R>(&dir.join(&file), start, remaining).await?;
            skipped += read.skipped;
            batch.records.extend(read.records);
            if read.end > start {
                position = Some(SpoolCursor {
                    file: file.clone(),
                    offset: read.end,
                });
            }
            if read.partial_tail {
                debug!(scope, file = %file, "spool file ends mid-line, waiting for the writer");
                break;
            }
            if batch.records.len() >= self.batch_limit {
                break;
            }
        }

        if let Some(position) = position {
            debug!(scope, records = batch.records.len(), cursor = %position.encode(), "read spool");
            batch.watermark = Some(Watermark::Cursor(position.encode()));
            if skipped > 0 {
                batch.metadata.set("skipped_lines", skipped);
            }
        }
        Ok(batch)
    }
}

async fn list_spool_files(dir: &Path) -> Result<Vec<String>, ChorusError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".jsonl") && entry.file_type().await?.is_file() {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

struct LinesRead<R> {
    records: Vec<R>,
    /// Offset just past the last complete line consumed.
    end: u64,
    skipped: u64,
    /// Stopped at bytes with no trailing newline yet.
    partial_tail: bool,
}

async fn read_lines<R: DeserializeOwned>(
    path: &Path,
    start: u64,
    limit: usize,
) -> Result<LinesRead<R>, ChorusError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut reader = BufReader::new(file);

    let mut read = LinesRead {
        records: Vec::new(),
        end: start,
        skipped: 0,
        partial_tail: false,
    };
    let mut line = Vec::new();
    while read.records.len() < limit {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        if line.last() != Some(&b'\n') {
            read.partial_tail = true;
            break;
        }
        read.end += n as u64;

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<R>(text) {
            Ok(record) => read.records.push(record),
            Err(e) => {
                read.skipped += 1;
                warn!(file = %path.display(), offset = read.end - n as u64, error = %e, "skipping malformed spool line");
            }
        }
    }
    Ok(read)
}
