// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chorus serve` command implementation.
//!
//! Opens the content store, search index and state database, builds one
//! adapter per enabled platform and runs the platform manager until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use chorus_adapters::build_adapters;
use chorus_config::ChorusConfig;
use chorus_core::ChorusError;
use chorus_daemon::{ManagerOptions, PlatformManager, install_signal_handler, restart};
use chorus_search::SearchIndex;
use chorus_state::{StateManager, StateOptions};
use chorus_store::ContentStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(not(target_env = "msvc"))]
const MEMORY_REPORT_INTERVAL: Duration = Duration::from_secs(300);

/// Runs the `chorus serve` command.
pub async fn run_serve(config: ChorusConfig) -> Result<(), ChorusError> {
    init_tracing(&config.daemon.log_level);
    let cancel = install_signal_handler();

    let store = Arc::new(ContentStore::open(config.store_path()).await?);
    let search = Arc::new(SearchIndex::open(&config.search_database_path()).await?);
    let caught_up = search.catch_up(&store).await?;
    if caught_up > 0 {
        warn!(messages = caught_up, "indexed stored messages missing from search");
    }
    let state = Arc::new(StateManager::open(&config.state_database_path(), state_options(&config)).await?);

    let adapters = build_adapters(&config);
    info!(adapters = adapters.len(), "platform adapters built");

    let manager = PlatformManager::new(
        adapters,
        store,
        search.clone(),
        state.clone(),
        ManagerOptions::from_config(&config),
    )
    .with_restart_policy(restart::from_config(&config.restart));

    let report = manager.start().await?;
    for (platform, error) in &report.failed {
        warn!(platform = %platform, error = %error, "platform failed to start");
    }
    if report.started.is_empty() && report.failed.is_empty() {
        warn!("no platform has credentials; idling until shutdown");
    }

    let memory = tokio::spawn(memory_monitor(cancel.clone()));
    cancel.cancelled().await;

    let stop = manager.stop().await?;
    let _ = memory.await;
    drop(manager);

    match Arc::try_unwrap(search) {
        Ok(search) => search.close().await?,
        Err(_) => warn!("search index still in use, skipping close"),
    }
    match Arc::try_unwrap(state) {
        Ok(state) => state.close().await?,
        Err(_) => warn!("state database still in use, skipping checkpoint"),
    }
    info!(clean = stop.clean, "chorus stopped");
    Ok(())
}

pub(crate) fn state_options(config: &ChorusConfig) -> StateOptions {
    StateOptions {
        busy_timeout: Duration::from_millis(config.state.busy_timeout_ms),
        health_history_limit: config.state.health_history_limit,
    }
}

/// Periodically logs jemalloc heap usage.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(MEMORY_REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
                debug!(
                    allocated_mb = allocated / (1024 * 1024),
                    resident_mb = resident / (1024 * 1024),
                    "memory usage"
                );
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Stub memory monitor for MSVC (no jemalloc).
#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// Initializes the tracing subscriber with the given log level.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chorus={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_options_follow_config() {
        let mut config = ChorusConfig::default();
        config.state.busy_timeout_ms = 250;
        config.state.health_history_limit = 7;
        let options = state_options(&config);
        assert_eq!(options.busy_timeout, Duration::from_millis(250));
        assert_eq!(options.health_history_limit, 7);
    }
}
