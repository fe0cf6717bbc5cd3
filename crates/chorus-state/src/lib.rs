// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed daemon state for Chorus.
//!
//! WAL-mode SQLite with embedded migrations, accessed through a single
//! `tokio-rusqlite` connection. Stores per-platform connection snapshots,
//! resumable sync watermarks, run lifecycle for unclean-shutdown detection
//! and a bounded health check history.

pub mod database;
pub mod manager;
pub mod migrations;
pub mod queries;

pub use database::Database;
pub use manager::{StartRecord, StateManager, StateOptions};
