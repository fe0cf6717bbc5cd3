// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only commands: `search`, `recent`, `thread` and `reindex`.
//!
//! These open the store and databases directly and never start adapters.

use std::io::IsTerminal;
use std::sync::Arc;

use chorus_config::ChorusConfig;
use chorus_core::{AdapterMap, ChorusError, MessageKind, Platform, ThreadId};
use chorus_daemon::{ManagerOptions, PlatformManager, ThreadView};
use chorus_search::{SearchFilters, SearchHit, SearchIndex};
use chorus_state::StateManager;
use chorus_store::ContentStore;
use chrono::{DateTime, NaiveDate, Utc};

use crate::serve::{init_tracing, state_options};

/// Parsed `chorus search` arguments.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub platform: Option<Platform>,
    pub kind: Option<MessageKind>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub thread: Option<String>,
    pub limit: Option<usize>,
}

impl SearchArgs {
    fn filters(&self, default_limit: usize) -> Result<SearchFilters, ChorusError> {
        Ok(SearchFilters {
            platform: self.platform,
            kind: self.kind,
            since: self.since.as_deref().map(parse_time).transpose()?,
            until: self.until.as_deref().map(parse_time).transpose()?,
            thread: self.thread.as_deref().map(ThreadId::from),
            limit: Some(self.limit.unwrap_or(default_limit)),
        })
    }
}

/// Accepts RFC 3339 timestamps or plain dates (midnight UTC).
fn parse_time(value: &str) -> Result<DateTime<Utc>, ChorusError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            ChorusError::Validation(format!(
                "`{value}` is not a date (YYYY-MM-DD) or RFC 3339 timestamp"
            ))
        })
}

/// A manager with no adapters, for the query surface only.
pub(crate) async fn open_offline(
    config: &ChorusConfig,
    adapters: AdapterMap,
) -> Result<PlatformManager, ChorusError> {
    init_tracing("warn");
    let store = Arc::new(ContentStore::open(config.store_path()).await?);
    let search = Arc::new(SearchIndex::open(&config.search_database_path()).await?);
    let state =
        Arc::new(StateManager::open(&config.state_database_path(), state_options(config)).await?);
    Ok(PlatformManager::new(
        adapters,
        store,
        search,
        state,
        ManagerOptions::from_config(config),
    ))
}

pub async fn run_search(
    config: &ChorusConfig,
    args: SearchArgs,
    json: bool,
) -> Result<(), ChorusError> {
    let filters = args.filters(config.search.default_limit)?;
    let manager = open_offline(config, AdapterMap::new()).await?;
    let hits = manager.search(&args.query, &filters).await?;
    if json {
        print_json(&hits);
    } else if hits.is_empty() {
        println!("no matches for `{}`", args.query);
    } else {
        print_hits(&hits, true);
    }
    Ok(())
}

pub async fn run_recent(config: &ChorusConfig, limit: usize, json: bool) -> Result<(), ChorusError> {
    let manager = open_offline(config, AdapterMap::new()).await?;
    let hits = manager.recent(limit).await?;
    if json {
        print_json(&hits);
    } else {
        print_hits(&hits, false);
    }
    Ok(())
}

pub async fn run_thread(
    config: &ChorusConfig,
    id: &str,
    limit: usize,
    json: bool,
) -> Result<(), ChorusError> {
    let manager = open_offline(config, AdapterMap::new()).await?;
    let Some(view) = manager.thread(&ThreadId::from(id), limit).await? else {
        return Err(ChorusError::Validation(format!("no thread with id `{id}`")));
    };
    if json {
        print_json(&view);
    } else {
        print_thread(&view);
    }
    Ok(())
}

pub async fn run_reindex(config: &ChorusConfig) -> Result<(), ChorusError> {
    let manager = open_offline(config, AdapterMap::new()).await?;
    let indexed = manager.search_index().rebuild(manager.store()).await?;
    println!("reindexed {indexed} messages");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
    );
}

fn print_hits(hits: &[SearchHit], with_snippet: bool) {
    let use_color = std::io::stdout().is_terminal();
    for hit in hits {
        let header = format!(
            "{} {} {}",
            hit.created_at.format("%Y-%m-%d %H:%M"),
            hit.platform,
            hit.author_name
        );
        let body = if with_snippet && !hit.snippet.is_empty() {
            &hit.snippet
        } else {
            &hit.content
        };
        if use_color {
            use colored::Colorize;
            println!("{}  {}", header.bold(), hit.thread_id.to_string().dimmed());
        } else {
            println!("{header}  {}", hit.thread_id);
        }
        if let Some(subject) = &hit.subject {
            println!("    {subject}");
        }
        println!("    {}", one_line(body));
    }
}

fn print_thread(view: &ThreadView) {
    println!();
    println!(
        "  {} ({}, {} participants)",
        view.thread.title,
        view.thread.kind,
        view.thread.participants.len()
    );
    println!("  {}", "-".repeat(35));
    for message in &view.messages {
        let arrow = match message.tags.direction() {
            Some(chorus_core::Direction::Outgoing) => ">",
            _ => "<",
        };
        println!(
            "  {} {arrow} {}: {}",
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.author.name,
            one_line(&message.content)
        );
    }
    println!();
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_dates_and_timestamps() {
        assert_eq!(
            parse_time("2026-03-01").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2026-03-01T10:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn search_args_build_filters() {
        let args = SearchArgs {
            query: "ferry".into(),
            platform: Some(Platform::Email),
            since: Some("2026-01-01".into()),
            thread: Some("thr_1".into()),
            ..SearchArgs::default()
        };
        let filters = args.filters(20).unwrap();
        assert_eq!(filters.platform, Some(Platform::Email));
        assert_eq!(filters.limit, Some(20));
        assert_eq!(filters.thread, Some(ThreadId::from("thr_1")));
        assert!(filters.since.is_some());
        assert!(filters.until.is_none());
    }

    #[test]
    fn one_line_collapses_whitespace() {
        assert_eq!(one_line("a\n\n  b\tc"), "a b c");
    }
}
