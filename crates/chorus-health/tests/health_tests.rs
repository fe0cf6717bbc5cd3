// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the health monitor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_core::{AdapterStats, ConnectionStatus, Platform, PlatformState};
use chorus_health::{HealthEvent, HealthMonitor, HealthPolicy, LiveStatus, OverallHealth};
use chorus_state::{StateManager, StateOptions};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeLive(Mutex<HashMap<Platform, AdapterStats>>);

impl FakeLive {
    fn set(&self, platform: Platform, status: ConnectionStatus, days_quiet: Option<i64>) {
        let stats = AdapterStats {
            status,
            connected: status == ConnectionStatus::Connected,
            last_message_at: days_quiet.map(|d| Utc::now() - chrono::Duration::days(d)),
            ..AdapterStats::default()
        };
        self.0.lock().unwrap().insert(platform, stats);
    }
}

impl LiveStatus for FakeLive {
    fn live_stats(&self, platform: Platform) -> Option<AdapterStats> {
        self.0.lock().unwrap().get(&platform).cloned()
    }
}

fn policy(threshold: u32) -> HealthPolicy {
    HealthPolicy {
        check_interval: Duration::from_millis(20),
        stale_threshold: chrono::Duration::hours(6),
        error_window: chrono::Duration::minutes(15),
        error_threshold: threshold,
    }
}

async fn monitor(platforms: Vec<Platform>, threshold: u32) -> (HealthMonitor, Arc<FakeLive>, Arc<StateManager>) {
    let state = Arc::new(StateManager::open_in_memory(StateOptions::default()).await.unwrap());
    let live = Arc::new(FakeLive::default());
    let monitor = HealthMonitor::new(state.clone(), policy(threshold), platforms)
        .with_live_status(live.clone());
    (monitor, live, state)
}

#[tokio::test]
async fn quiet_connected_platform_is_healthy_with_an_issue() {
    let (monitor, live, state) = monitor(vec![Platform::Signal], 3).await;
    live.set(Platform::Signal, ConnectionStatus::Connected, Some(400));

    let health = monitor.check_platform(Platform::Signal).await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.issues.len(), 1);
    assert!(health.issues[0].starts_with("no messages for"));

    let recorded = state.recent_health_checks(Platform::Signal, 5).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].healthy);
}

#[tokio::test]
async fn disconnected_platform_is_unhealthy() {
    let (monitor, live, _state) = monitor(vec![Platform::Telegram], 3).await;
    live.set(Platform::Telegram, ConnectionStatus::Error, None);

    let health = monitor.check_platform(Platform::Telegram).await.unwrap();
    assert!(!health.healthy);
    assert_eq!(health.status, ConnectionStatus::Error);
}

#[tokio::test]
async fn repeated_failures_in_window_keep_platform_unhealthy() {
    let (monitor, live, state) = monitor(vec![Platform::Email], 3).await;
    for _ in 0..3 {
        state
            .record_health_check(Platform::Email, false, false, &["down".into()])
            .await
            .unwrap();
    }
    live.set(Platform::Email, ConnectionStatus::Connected, Some(0));

    let health = monitor.check_platform(Platform::Email).await.unwrap();
    assert!(!health.healthy);
    assert_eq!(health.recent_failures, 3);
}

#[tokio::test]
async fn platform_recovers_once_failures_leave_the_window() {
    let state = Arc::new(StateManager::open_in_memory(StateOptions::default()).await.unwrap());
    let live = Arc::new(FakeLive::default());
    let policy = HealthPolicy {
        error_window: chrono::Duration::seconds(1),
        ..policy(3)
    };
    let monitor = HealthMonitor::new(state.clone(), policy, vec![Platform::Telegram])
        .with_live_status(live.clone());
    let mut events = monitor.subscribe();

    live.set(Platform::Telegram, ConnectionStatus::Disconnected, None);
    for _ in 0..3 {
        assert!(!monitor.check_platform(Platform::Telegram).await.unwrap().healthy);
    }

    live.set(Platform::Telegram, ConnectionStatus::Connected, None);
    let health = monitor.check_platform(Platform::Telegram).await.unwrap();
    assert!(!health.healthy);
    assert_eq!(health.recent_failures, 3);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let health = monitor.check_platform(Platform::Telegram).await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.recent_failures, 0);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let platform = Platform::Telegram;
    assert_eq!(seen.last(), Some(&HealthEvent::Recovered { platform }));
    assert_eq!(
        seen.iter()
            .filter(|e| **e == HealthEvent::Recovered { platform })
            .count(),
        1
    );
}

#[tokio::test]
async fn persisted_state_is_used_without_live_adapter() {
    let state = Arc::new(StateManager::open_in_memory(StateOptions::default()).await.unwrap());
    let mut saved = PlatformState::new(Platform::Discord);
    saved.status = ConnectionStatus::Connected;
    state.save_platform_state(&saved).await.unwrap();

    let monitor = HealthMonitor::new(state.clone(), policy(3), vec![Platform::Discord, Platform::Whatsapp]);
    let report = monitor.check_all().await;
    assert_eq!(report.overall, OverallHealth::Degraded);
    assert!(report.platform(Platform::Discord).unwrap().healthy);
    assert!(!report.platform(Platform::Whatsapp).unwrap().healthy);
}

#[tokio::test]
async fn transitions_emit_recovered() {
    let (monitor, live, _state) = monitor(vec![Platform::Signal], 5).await;
    let mut events = monitor.subscribe();

    live.set(Platform::Signal, ConnectionStatus::Connected, None);
    monitor.check_platform(Platform::Signal).await.unwrap();
    live.set(Platform::Signal, ConnectionStatus::Disconnected, None);
    monitor.check_platform(Platform::Signal).await.unwrap();
    live.set(Platform::Signal, ConnectionStatus::Connected, None);
    monitor.check_platform(Platform::Signal).await.unwrap();
    monitor.check_platform(Platform::Signal).await.unwrap();

    let platform = Platform::Signal;
    assert_eq!(events.recv().await.unwrap(), HealthEvent::Healthy { platform });
    assert!(matches!(events.recv().await.unwrap(), HealthEvent::Unhealthy { .. }));
    assert_eq!(events.recv().await.unwrap(), HealthEvent::Recovered { platform });
    assert_eq!(events.recv().await.unwrap(), HealthEvent::Healthy { platform });
}

#[tokio::test]
async fn no_platforms_report_healthy() {
    let (monitor, _live, _state) = monitor(Vec::new(), 3).await;
    let report = monitor.check_all().await;
    assert_eq!(report.overall, OverallHealth::Healthy);
    assert!(report.platforms.is_empty());
}

#[tokio::test]
async fn spawned_loop_checks_until_cancelled() {
    let (monitor, live, state) = monitor(vec![Platform::Signal], 3).await;
    live.set(Platform::Signal, ConnectionStatus::Connected, None);
    let monitor = Arc::new(monitor);
    let mut events = monitor.subscribe();

    let cancel = CancellationToken::new();
    let handle = monitor.clone().spawn(cancel.clone());
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.platform(), Platform::Signal);

    cancel.cancel();
    handle.await.unwrap();
    assert!(!state.recent_health_checks(Platform::Signal, 10).await.unwrap().is_empty());
}
