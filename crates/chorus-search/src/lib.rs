// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-text search over stored messages.
//!
//! The index is a derived view of the content store: an SQLite table of
//! message rows with an external-content FTS5 table kept in sync by
//! triggers. It can be dropped and rebuilt from the store at any time.

pub mod index;
mod migrations;
pub mod query;

pub use index::SearchIndex;
pub use query::{SearchFilters, SearchHit};
