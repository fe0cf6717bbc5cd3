// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interval-driven health monitor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_config::model::HealthConfig;
use chorus_core::{AdapterStats, ChorusError, ConnectionStatus, Platform};
use chorus_state::StateManager;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::report::{HealthEvent, HealthReport, OverallHealth, PlatformHealth};

const EVENT_CAPACITY: usize = 64;

/// Source of live adapter statistics. Takes precedence over persisted state.
pub trait LiveStatus: Send + Sync {
    /// `None` when no adapter for `platform` is running.
    fn live_stats(&self, platform: Platform) -> Option<AdapterStats>;
}

/// Thresholds for a health check.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub check_interval: Duration,
    pub stale_threshold: chrono::Duration,
    pub error_window: chrono::Duration,
    pub error_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            stale_threshold: seconds(config.stale_threshold_secs),
            error_window: seconds(config.error_window_secs),
            error_threshold: config.error_threshold,
        }
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}

/// Evaluates the health of a fixed set of platforms.
pub struct HealthMonitor {
    state: Arc<StateManager>,
    live: Option<Arc<dyn LiveStatus>>,
    policy: HealthPolicy,
    platforms: Vec<Platform>,
    events: broadcast::Sender<HealthEvent>,
    last_healthy: Mutex<HashMap<Platform, bool>>,
}

impl HealthMonitor {
    pub fn new(state: Arc<StateManager>, policy: HealthPolicy, platforms: Vec<Platform>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            live: None,
            policy,
            platforms,
            events,
            last_healthy: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_live_status(mut self, live: Arc<dyn LiveStatus>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Runs one check for `platform`, records it and broadcasts the outcome.
    pub async fn check_platform(&self, platform: Platform) -> Result<PlatformHealth, ChorusError> {
        let now = Utc::now();
        let (status, last_message_at) = self.observed(platform).await?;
        let connected = status == ConnectionStatus::Connected;
        let mut issues = Vec::new();
        let mut healthy = connected;

        if !connected {
            issues.push(format!("not connected (status: {status})"));
        }

        if let Some(last) = last_message_at
            && now - last > self.policy.stale_threshold
        {
            issues.push(format!(
                "no messages for {} minutes",
                (now - last).num_minutes()
            ));
        }

        let recent_failures = self
            .state
            .count_connection_failures_since(platform, now - self.policy.error_window)
            .await?;
        if recent_failures >= self.policy.error_threshold {
            healthy = false;
            issues.push(format!(
                "{recent_failures} connection failures in the last {} seconds",
                self.policy.error_window.num_seconds()
            ));
        }

        self.state
            .record_health_check(platform, healthy, connected, &issues)
            .await?;

        let result = PlatformHealth {
            platform,
            healthy,
            status,
            issues,
            last_message_at,
            recent_failures,
            checked_at: now,
        };
        self.publish(&result);
        Ok(result)
    }

    /// Checks every monitored platform. A platform whose check itself fails
    /// is reported unhealthy with the error as its issue.
    pub async fn check_all(&self) -> HealthReport {
        let mut platforms = Vec::with_capacity(self.platforms.len());
        for &platform in &self.platforms {
            match self.check_platform(platform).await {
                Ok(health) => platforms.push(health),
                Err(e) => {
                    warn!(platform = %platform, error = %e, "health check failed");
                    platforms.push(PlatformHealth {
                        platform,
                        healthy: false,
                        status: ConnectionStatus::Error,
                        issues: vec![format!("health check failed: {e}")],
                        last_message_at: None,
                        recent_failures: 0,
                        checked_at: Utc::now(),
                    });
                }
            }
        }
        let overall = OverallHealth::classify(&platforms);
        debug!(overall = %overall, platforms = platforms.len(), "health check complete");
        HealthReport {
            overall,
            platforms,
            checked_at: Utc::now(),
        }
    }

    /// Spawns the periodic check loop. The first check runs one interval
    /// after spawning.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.policy.check_interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = period.as_secs(), "health monitor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.check_all().await;
                        if report.overall != OverallHealth::Healthy {
                            warn!(overall = %report.overall, "daemon health is not fully healthy");
                        }
                    }
                }
            }
            debug!("health monitor stopped");
        })
    }

    async fn observed(
        &self,
        platform: Platform,
    ) -> Result<(ConnectionStatus, Option<DateTime<Utc>>), ChorusError> {
        if let Some(stats) = self.live.as_ref().and_then(|l| l.live_stats(platform)) {
            return Ok((stats.status, stats.last_message_at));
        }
        Ok(match self.state.load_platform_state(platform).await? {
            Some(saved) => (saved.status, saved.last_message_at),
            None => (ConnectionStatus::Disconnected, None),
        })
    }

    fn publish(&self, health: &PlatformHealth) {
        let previous = self
            .last_healthy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(health.platform, health.healthy);
        let event = match (health.healthy, previous) {
            (true, Some(false)) => {
                info!(platform = %health.platform, "platform recovered");
                HealthEvent::Recovered {
                    platform: health.platform,
                }
            }
            (true, _) => HealthEvent::Healthy {
                platform: health.platform,
            },
            (false, _) => {
                warn!(platform = %health.platform, issues = ?health.issues, "platform unhealthy");
                HealthEvent::Unhealthy {
                    platform: health.platform,
                    issues: health.issues.clone(),
                }
            }
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
