// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The state manager: the single owner of the state database.

use std::path::Path;
use std::time::Duration;

use chorus_core::{ChorusError, HealthCheckRecord, Platform, PlatformState, Resume, SyncState};
use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::queries::{health, lifecycle, platform_state, sync};

pub use crate::queries::lifecycle::StartRecord;

/// Tuning for [`StateManager::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateOptions {
    pub busy_timeout: Duration,
    /// Health check rows retained per platform.
    pub health_history_limit: u32,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            health_history_limit: 100,
        }
    }
}

/// Platform status, sync progress, run lifecycle and health history.
///
/// Shared by the orchestrator and the health monitor; every method is one
/// transaction on the database thread.
pub struct StateManager {
    db: Database,
    health_history_limit: u32,
}

impl StateManager {
    pub async fn open(path: &Path, options: StateOptions) -> Result<Self, ChorusError> {
        let db = Database::open(path, options.busy_timeout).await?;
        Ok(Self {
            db,
            health_history_limit: options.health_history_limit.max(1),
        })
    }

    pub async fn open_in_memory(options: StateOptions) -> Result<Self, ChorusError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
            health_history_limit: options.health_history_limit.max(1),
        })
    }

    // --- platform state ---

    pub async fn save_platform_state(&self, state: &PlatformState) -> Result<(), ChorusError> {
        platform_state::save(&self.db, state).await
    }

    pub async fn load_platform_state(
        &self,
        platform: Platform,
    ) -> Result<Option<PlatformState>, ChorusError> {
        platform_state::load(&self.db, platform).await
    }

    pub async fn load_all_platform_states(&self) -> Result<Vec<PlatformState>, ChorusError> {
        platform_state::load_all(&self.db).await
    }

    // --- sync progress ---

    pub async fn save_sync_cursor(&self, platform: Platform, cursor: &str) -> Result<(), ChorusError> {
        sync::save_cursor(&self.db, platform, cursor).await
    }

    pub async fn load_sync_cursor(&self, platform: Platform) -> Result<Option<String>, ChorusError> {
        sync::load_cursor(&self.db, platform).await
    }

    /// Returns `false` when the save was ignored as stale.
    pub async fn save_sync_state(&self, state: &SyncState) -> Result<bool, ChorusError> {
        sync::save_state(&self.db, state).await
    }

    pub async fn load_sync_state(
        &self,
        platform: Platform,
        source: &str,
        scope: &str,
    ) -> Result<Option<SyncState>, ChorusError> {
        sync::load_state(&self.db, platform, source, scope).await
    }

    pub async fn load_platform_sync_states(
        &self,
        platform: Platform,
    ) -> Result<Vec<SyncState>, ChorusError> {
        sync::load_platform_states(&self.db, platform).await
    }

    /// Everything an adapter needs to pick up where it left off.
    pub async fn load_resume(&self, platform: Platform) -> Result<Resume, ChorusError> {
        Ok(Resume {
            sync_states: self.load_platform_sync_states(platform).await?,
            cursor: self.load_sync_cursor(platform).await?,
        })
    }

    // --- lifecycle ---

    pub async fn record_start(&self) -> Result<StartRecord, ChorusError> {
        lifecycle::record_start(&self.db).await
    }

    pub async fn record_shutdown(&self, clean: bool) -> Result<(), ChorusError> {
        lifecycle::record_shutdown(&self.db, clean).await
    }

    pub async fn was_clean_shutdown(&self) -> Result<bool, ChorusError> {
        lifecycle::was_clean_shutdown(&self.db).await
    }

    // --- health history ---

    /// `connected` is the connection outcome alone; `healthy` is the
    /// overall verdict.
    pub async fn record_health_check(
        &self,
        platform: Platform,
        healthy: bool,
        connected: bool,
        issues: &[String],
    ) -> Result<HealthCheckRecord, ChorusError> {
        health::record(
            &self.db,
            platform,
            healthy,
            connected,
            issues,
            self.health_history_limit,
        )
        .await
    }

    pub async fn recent_health_checks(
        &self,
        platform: Platform,
        limit: u32,
    ) -> Result<Vec<HealthCheckRecord>, ChorusError> {
        health::recent(&self.db, platform, limit).await
    }

    pub async fn count_connection_failures_since(
        &self,
        platform: Platform,
        since: DateTime<Utc>,
    ) -> Result<u32, ChorusError> {
        health::count_connection_failures_since(&self.db, platform, since).await
    }

    /// Checkpoints the WAL and closes the database.
    pub async fn close(self) -> Result<(), ChorusError> {
        self.db.close().await
    }
}
