// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query types and FTS5 query construction.

use chorus_core::{MessageId, MessageKind, Platform, ThreadId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of hits when a caller does not set a limit.
pub const DEFAULT_LIMIT: usize = 20;

/// Optional narrowing applied on top of the text match.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub platform: Option<Platform>,
    pub kind: Option<MessageKind>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub thread: Option<ThreadId>,
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// A message row returned from the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: MessageId,
    pub platform: Platform,
    pub kind: MessageKind,
    pub thread_id: ThreadId,
    pub author_name: String,
    pub author_handle: String,
    pub subject: Option<String>,
    pub content: String,
    /// Highlighted excerpt around the match. Empty for non-search listings.
    pub snippet: String,
    pub created_at: DateTime<Utc>,
    /// Relevance, higher is better. Zero for non-search listings.
    pub score: f64,
}

/// Turns free text into an FTS5 expression that matches every term.
///
/// Each whitespace-separated token is wrapped in double quotes so that FTS5
/// operators and punctuation in user input are treated literally. Returns
/// `None` when nothing searchable remains.
pub fn fts_expression(input: &str) -> Option<String> {
    let terms: Vec<String> = input
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{token}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_every_term() {
        assert_eq!(
            fts_expression("hello  world").as_deref(),
            Some("\"hello\" \"world\"")
        );
    }

    #[test]
    fn operators_are_neutralized() {
        assert_eq!(
            fts_expression("foo OR bar*").as_deref(),
            Some("\"foo\" \"OR\" \"bar*\"")
        );
        assert_eq!(fts_expression("say \"hi\"").as_deref(), Some("\"say\" \"hi\""));
    }

    #[test]
    fn punctuation_only_is_empty() {
        assert_eq!(fts_expression("   "), None);
        assert_eq!(fts_expression("-- ** \"\""), None);
    }

    #[test]
    fn default_limit_applies() {
        assert_eq!(SearchFilters::default().limit(), DEFAULT_LIMIT);
        let filters = SearchFilters {
            limit: Some(5),
            ..Default::default()
        };
        assert_eq!(filters.limit(), 5);
    }
}
