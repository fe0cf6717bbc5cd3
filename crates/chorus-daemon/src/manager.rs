// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The platform manager: adapter lifecycle, event pumps, health reaction
//! and shutdown.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_config::ChorusConfig;
use chorus_core::{
    AdapterMap, AdapterStats, ChorusError, Message, Platform, PlatformAdapter, Thread, ThreadId,
};
use chorus_health::{HealthEvent, HealthMonitor, HealthPolicy, HealthReport, LiveStatus};
use chorus_search::{SearchFilters, SearchHit, SearchIndex};
use chorus_state::StateManager;
use chorus_store::ContentStore;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;
use crate::pump::{Pump, StateBook};
use crate::restart::{ManualIntervention, RestartDecision, RestartPolicy};
use crate::shutdown::join_until;
use crate::stats::{DaemonStats, PlatformStats};

/// Tuning for [`PlatformManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Upper bound on [`PlatformManager::stop`].
    pub shutdown_timeout: Duration,
    /// How often platform snapshots are written to the state database.
    pub flush_interval: Duration,
    /// Attempts per message before the batch counts as failed.
    pub ingest_attempts: u32,
    pub retry_base_delay: Duration,
    pub health: HealthPolicy,
    /// Configured self handle per platform.
    pub self_handles: BTreeMap<Platform, String>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(30),
            ingest_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            health: HealthPolicy::default(),
            self_handles: BTreeMap::new(),
        }
    }
}

impl ManagerOptions {
    pub fn from_config(config: &ChorusConfig) -> Self {
        let self_handles = Platform::ALL
            .into_iter()
            .filter_map(|p| config.self_handle(p).map(|h| (p, h.to_string())))
            .collect();
        Self {
            shutdown_timeout: Duration::from_secs(config.daemon.shutdown_timeout_secs),
            flush_interval: Duration::from_secs(config.daemon.state_flush_interval_secs),
            ingest_attempts: config.daemon.ingest_retries,
            retry_base_delay: Duration::from_millis(200),
            health: HealthPolicy::from(&config.health),
            self_handles,
        }
    }
}

/// Outcome of [`PlatformManager::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartReport {
    pub started: Vec<Platform>,
    /// Adapter present but no credentials found.
    pub skipped: Vec<Platform>,
    /// Authenticated, but the adapter failed to start.
    pub failed: Vec<(Platform, String)>,
    /// No adapter registered.
    pub not_configured: Vec<Platform>,
    pub previous_clean: bool,
}

/// Outcome of [`PlatformManager::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// `false` when the shutdown deadline elapsed.
    pub clean: bool,
}

/// A thread and its most recent messages, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    pub thread: Thread,
    pub messages: Vec<Message>,
}

/// State reachable from the background tasks.
struct Shared {
    adapters: AdapterMap,
    state: Arc<StateManager>,
    ingestor: Arc<Ingestor>,
    book: Arc<StateBook>,
    managed: Mutex<BTreeSet<Platform>>,
    pending_restarts: Mutex<HashSet<Platform>>,
}

impl Shared {
    fn managed(&self) -> BTreeSet<Platform> {
        self.managed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_managed(&self, platforms: impl IntoIterator<Item = Platform>) {
        let mut managed = self.managed.lock().unwrap_or_else(|e| e.into_inner());
        managed.clear();
        managed.extend(platforms);
    }

    /// Returns `false` if a restart of `platform` is already pending.
    fn claim_restart(&self, platform: Platform) -> bool {
        self.pending_restarts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(platform)
    }

    fn release_restart(&self, platform: Platform) {
        self.pending_restarts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&platform);
    }

    /// Stops the adapter and starts it again from the persisted
    /// watermarks. The event pump keeps its subscription across restarts.
    async fn restart_platform(&self, platform: Platform) -> Result<(), ChorusError> {
        if !self.managed().contains(&platform) {
            return Err(ChorusError::platform(platform, "not managed by this run"));
        }
        let adapter = self
            .adapters
            .get(&platform)
            .cloned()
            .ok_or(ChorusError::NotConfigured { platform })?;
        info!(platform = %platform, "restarting platform adapter");
        adapter.stop().await?;
        let resume = self.state.load_resume(platform).await?;
        adapter.start(resume).await
    }

    async fn flush_states(&self) {
        for snapshot in self.book.all() {
            if let Err(e) = self.state.save_platform_state(&snapshot).await {
                warn!(platform = %snapshot.platform, error = %e, "failed to flush platform state");
            }
        }
    }
}

/// Live adapter statistics for the health monitor.
struct LiveAdapters(Arc<Shared>);

impl LiveStatus for LiveAdapters {
    fn live_stats(&self, platform: Platform) -> Option<AdapterStats> {
        if !self.0.managed().contains(&platform) {
            return None;
        }
        self.0.adapters.get(&platform).map(|a| a.stats())
    }
}

/// Tasks belonging to one `start`/`stop` cycle.
struct Runtime {
    cancel: CancellationToken,
    pump_cancel: CancellationToken,
    background: Vec<(String, JoinHandle<()>)>,
    pumps: Vec<(String, JoinHandle<()>)>,
    restarts: TaskTracker,
    monitor: Arc<HealthMonitor>,
}

/// Owns every platform adapter and wires their events into the content
/// store, search index and state database.
pub struct PlatformManager {
    shared: Arc<Shared>,
    store: Arc<ContentStore>,
    search: Arc<SearchIndex>,
    options: ManagerOptions,
    restart: Arc<dyn RestartPolicy>,
    runtime: tokio::sync::Mutex<Option<Runtime>>,
}

impl PlatformManager {
    pub fn new(
        adapters: AdapterMap,
        store: Arc<ContentStore>,
        search: Arc<SearchIndex>,
        state: Arc<StateManager>,
        options: ManagerOptions,
    ) -> Self {
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            search.clone(),
            options.ingest_attempts,
            options.retry_base_delay,
        ));
        Self {
            shared: Arc::new(Shared {
                adapters,
                state,
                ingestor,
                book: Arc::new(StateBook::default()),
                managed: Mutex::new(BTreeSet::new()),
                pending_restarts: Mutex::new(HashSet::new()),
            }),
            store,
            search,
            options,
            restart: Arc::new(ManualIntervention),
            runtime: tokio::sync::Mutex::new(None),
        }
    }

    /// Replaces the default [`ManualIntervention`] policy.
    pub fn with_restart_policy(mut self, policy: Arc<dyn RestartPolicy>) -> Self {
        self.restart = policy;
        self
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn search_index(&self) -> &Arc<SearchIndex> {
        &self.search
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.shared.state
    }

    pub fn ingestor(&self) -> &Arc<Ingestor> {
        &self.shared.ingestor
    }

    pub fn adapter(&self, platform: Platform) -> Option<&Arc<dyn PlatformAdapter>> {
        self.shared.adapters.get(&platform)
    }

    /// Platforms whose adapter reports local credentials. Platforms
    /// without an adapter are simply absent.
    pub async fn discover_authenticated_platforms(&self) -> Vec<Platform> {
        let mut found = Vec::new();
        for (&platform, adapter) in &self.shared.adapters {
            if adapter.is_authenticated().await {
                found.push(platform);
            } else {
                debug!(platform = %platform, "no credentials found");
            }
        }
        found
    }

    /// Platforms with no registered adapter.
    pub fn not_configured(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| !self.shared.adapters.contains_key(p))
            .collect()
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// Platforms started (or attempted) by the current run.
    pub fn managed_platforms(&self) -> Vec<Platform> {
        self.shared.managed().into_iter().collect()
    }

    /// Records the run, starts every authenticated adapter from its saved
    /// watermarks and spawns the pumps, health monitor, health reaction
    /// and state flush tasks.
    pub async fn start(&self) -> Result<StartReport, ChorusError> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            return Err(ChorusError::Internal("platform manager already started".into()));
        }
        let shared = &self.shared;

        let run = shared.state.record_start().await?;
        if !run.previous_clean {
            warn!(
                previous_started_at = ?run.previous_started_at,
                "previous run did not shut down cleanly; resuming from last saved watermarks"
            );
        }
        shared.book.load(shared.state.load_all_platform_states().await?);

        let authenticated = self.discover_authenticated_platforms().await;
        let mut report = StartReport {
            not_configured: self.not_configured(),
            previous_clean: run.previous_clean,
            ..StartReport::default()
        };
        for &platform in &report.not_configured {
            debug!(platform = %platform, "platform not configured");
        }

        let cancel = CancellationToken::new();
        let pump_cancel = CancellationToken::new();
        let mut pumps = Vec::new();
        let mut managed = Vec::new();

        for (&platform, adapter) in &shared.adapters {
            if !authenticated.contains(&platform) {
                info!(platform = %platform, "no credentials, not starting");
                report.skipped.push(platform);
                continue;
            }

            let self_handle = self.options.self_handles.get(&platform).map(String::as_str);
            if let Err(e) = shared.ingestor.resolve_self(platform, self_handle).await {
                warn!(platform = %platform, error = %e, "failed to resolve self account");
            }

            let resume = match shared.state.load_resume(platform).await {
                Ok(resume) => resume,
                Err(e) => {
                    warn!(platform = %platform, error = %e, "failed to load sync state");
                    report.failed.push((platform, e.to_string()));
                    continue;
                }
            };

            let pump = Pump::new(
                platform,
                shared.ingestor.clone(),
                shared.state.clone(),
                shared.book.clone(),
            );
            let events = adapter.subscribe();
            pumps.push((
                format!("pump:{platform}"),
                tokio::spawn(pump.run(events, pump_cancel.clone())),
            ));
            managed.push(platform);

            match adapter.start(resume).await {
                Ok(()) => {
                    info!(platform = %platform, "platform adapter started");
                    report.started.push(platform);
                }
                Err(e) => {
                    warn!(platform = %platform, error = %e, "platform adapter failed to start");
                    report.failed.push((platform, e.to_string()));
                }
            }
        }
        shared.set_managed(managed.iter().copied());

        let monitor = Arc::new(
            HealthMonitor::new(shared.state.clone(), self.options.health.clone(), managed)
                .with_live_status(Arc::new(LiveAdapters(shared.clone()))),
        );
        let restarts = TaskTracker::new();
        let background = vec![
            (
                "health-reaction".to_string(),
                tokio::spawn(react_to_health(
                    shared.clone(),
                    self.restart.clone(),
                    monitor.subscribe(),
                    restarts.clone(),
                    cancel.clone(),
                )),
            ),
            ("health-monitor".to_string(), monitor.clone().spawn(cancel.clone())),
            (
                "state-flush".to_string(),
                tokio::spawn(flush_loop(
                    shared.clone(),
                    self.options.flush_interval,
                    cancel.clone(),
                )),
            ),
        ];

        info!(
            started = report.started.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            not_configured = report.not_configured.len(),
            "platform manager started"
        );
        *runtime = Some(Runtime {
            cancel,
            pump_cancel,
            background,
            pumps,
            restarts,
            monitor,
        });
        Ok(report)
    }

    /// Stops every adapter and task within the shutdown deadline, flushes
    /// platform snapshots and records the shutdown. Calling it when not
    /// started does nothing.
    pub async fn stop(&self) -> Result<StopReport, ChorusError> {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return Ok(StopReport { clean: true });
        };
        let deadline = Instant::now() + self.options.shutdown_timeout;
        info!(
            timeout_secs = self.options.shutdown_timeout.as_secs(),
            "stopping platform manager"
        );

        runtime.cancel.cancel();
        runtime.restarts.close();
        let mut clean = join_until(runtime.background, deadline).await;
        if tokio::time::timeout_at(deadline, runtime.restarts.wait())
            .await
            .is_err()
        {
            warn!("pending restarts did not finish before the shutdown deadline");
            clean = false;
        }

        let managed = self.shared.managed();
        let stops = managed.iter().filter_map(|platform| {
            let adapter = self.shared.adapters.get(platform)?.clone();
            let platform = *platform;
            Some(async move {
                (
                    platform,
                    tokio::time::timeout_at(deadline, adapter.stop()).await,
                )
            })
        });
        for (platform, result) in join_all(stops).await {
            match result {
                Ok(Ok(())) => debug!(platform = %platform, "adapter stopped"),
                Ok(Err(e)) => {
                    warn!(platform = %platform, error = %e, "adapter failed to stop");
                    clean = false;
                }
                Err(_) => {
                    warn!(platform = %platform, "adapter did not stop before the shutdown deadline");
                    clean = false;
                }
            }
        }

        runtime.pump_cancel.cancel();
        if !join_until(runtime.pumps, deadline).await {
            clean = false;
        }

        self.shared.flush_states().await;
        self.shared.set_managed([]);
        self.shared.state.record_shutdown(clean).await?;
        if clean {
            info!("platform manager stopped cleanly");
        } else {
            warn!("platform manager stopped, shutdown was not clean");
        }
        Ok(StopReport { clean })
    }

    /// Restarts one running platform from its persisted watermarks.
    pub async fn restart_platform(&self, platform: Platform) -> Result<(), ChorusError> {
        self.shared.restart_platform(platform).await
    }

    /// Runs a health check now. Outside a run, every configured platform
    /// is judged from its persisted state.
    pub async fn check_health(&self) -> HealthReport {
        let monitor = self.runtime.lock().await.as_ref().map(|r| r.monitor.clone());
        match monitor {
            Some(monitor) => monitor.check_all().await,
            None => {
                let platforms = self.shared.adapters.keys().copied().collect();
                HealthMonitor::new(
                    self.shared.state.clone(),
                    self.options.health.clone(),
                    platforms,
                )
                .check_all()
                .await
            }
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, ChorusError> {
        self.search.search(query, filters).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<SearchHit>, ChorusError> {
        self.search.recent(limit).await
    }

    /// The `limit` newest messages of a thread, read from the content store.
    pub async fn thread(
        &self,
        id: &ThreadId,
        limit: usize,
    ) -> Result<Option<ThreadView>, ChorusError> {
        let Some(thread) = self.store.get_thread(id) else {
            return Ok(None);
        };
        let metas = self.store.messages(Some(id));
        let skip = metas.len().saturating_sub(limit);
        let mut messages = Vec::with_capacity(metas.len() - skip);
        for meta in metas.into_iter().skip(skip) {
            match self.store.get_message(&meta.id).await? {
                Some(message) => messages.push(message),
                None => warn!(message_id = %meta.id, "message blob missing"),
            }
        }
        Ok(Some(ThreadView { thread, messages }))
    }

    pub async fn stats(&self) -> Result<DaemonStats, ChorusError> {
        let managed = self.shared.managed();
        let mut platforms = Vec::with_capacity(Platform::ALL.len());
        for platform in Platform::ALL {
            let adapter = self.shared.adapters.get(&platform);
            let persisted = match self.shared.book.get(platform) {
                Some(snapshot) => Some(snapshot),
                None => self.shared.state.load_platform_state(platform).await?,
            };
            platforms.push(PlatformStats {
                platform,
                configured: adapter.is_some(),
                running: managed.contains(&platform),
                live: adapter.map(|a| a.stats()),
                persisted,
            });
        }
        Ok(DaemonStats {
            store: self.store.stats(),
            indexed: self.search.count().await?,
            platforms,
        })
    }
}

async fn react_to_health(
    shared: Arc<Shared>,
    policy: Arc<dyn RestartPolicy>,
    mut events: broadcast::Receiver<HealthEvent>,
    restarts: TaskTracker,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(HealthEvent::Unhealthy { platform, issues }) => {
                if !shared.claim_restart(platform) {
                    debug!(platform = %platform, "restart already pending");
                    continue;
                }
                let RestartDecision::Restart { after } = policy.on_unhealthy(platform, &issues)
                else {
                    shared.release_restart(platform);
                    continue;
                };
                let shared = shared.clone();
                let cancel = cancel.clone();
                restarts.spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(after) => {
                            if let Err(e) = shared.restart_platform(platform).await {
                                warn!(platform = %platform, error = %e, "restart failed");
                            }
                        }
                    }
                    shared.release_restart(platform);
                });
            }
            Ok(HealthEvent::Recovered { platform }) => policy.on_recovered(platform),
            Ok(HealthEvent::Healthy { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "health reaction fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("health reaction stopped");
}

async fn flush_loop(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => shared.flush_states().await,
        }
    }
    debug!("state flush stopped");
}
