// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed message store for the Chorus sync daemon.
//!
//! The append-only event log under `events/` is the source of truth for
//! accounts, threads and message metadata; message bodies live as immutable
//! blobs under `blobs/`. Everything else, including counters, is rebuilt
//! from the log on open.

pub mod blob;
pub mod log;
pub mod models;
pub mod store;

pub use models::{AccountSpec, MessageMeta, MessageWrite, NewMessage, StoreStats, ThreadSpec};
pub use store::ContentStore;
