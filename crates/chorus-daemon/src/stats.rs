// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daemon-wide statistics.

use chorus_core::{AdapterStats, Platform, PlatformState};
use chorus_store::StoreStats;
use serde::Serialize;

/// What one platform looks like right now.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub platform: Platform,
    /// An adapter is registered for the platform.
    pub configured: bool,
    /// The adapter was started by this run.
    pub running: bool,
    /// Counters since the adapter was created.
    pub live: Option<AdapterStats>,
    /// Persisted snapshot, cumulative across runs.
    pub persisted: Option<PlatformState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStats {
    pub store: StoreStats,
    /// Rows in the search index. Lower than `store.messages` means the
    /// index needs a rebuild.
    pub indexed: u64,
    pub platforms: Vec<PlatformStats>,
}

impl DaemonStats {
    pub fn platform(&self, platform: Platform) -> Option<&PlatformStats> {
        self.platforms.iter().find(|p| p.platform == platform)
    }

    pub fn index_lagging(&self) -> bool {
        self.indexed < self.store.messages
    }
}
