// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete sync pipeline.
//!
//! Each test creates an isolated TestHarness with a temp store, search
//! index and state database driven by mock adapters. Tests are independent
//! and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use chorus_core::{
    ConnectionStatus, Direction, Platform, PlatformAdapter, SyncMetadata, ThreadKind, Watermark,
};
use chorus_daemon::BackoffRestart;
use chorus_health::{HealthPolicy, OverallHealth};
use chorus_search::SearchFilters;
use chorus_test_utils::fixtures::{dm, group, progress};
use chorus_test_utils::{MockAdapter, TestHarness, wait_until};

// ---- Ingestion ----

#[tokio::test]
async fn identical_messages_are_stored_once() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Signal)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let signal = harness.adapter(Platform::Signal);

    let a = dm(Platform::Signal, "+15550100", "hello", "m1", 1000);
    signal.emit_message(a.clone()).await;
    signal.emit_message(a).await;
    signal
        .emit_message(dm(Platform::Signal, "+15550100", "hello", "m2", 1000))
        .await;
    harness.wait_for_messages(2).await;

    let store = harness.manager.store();
    let stats = store.stats();
    assert_eq!(stats.messages, 2);
    assert_eq!(stats.threads, 1);
    let thread = &store.list_threads()[0];
    assert_eq!(thread.stats.message_count, 2);
    let author = store.find_account(Platform::Signal, "+15550100").unwrap();
    assert_eq!(author.stats.message_count, 2);

    harness.manager.stop().await.unwrap();
}

#[tokio::test]
async fn direction_is_outgoing_only_for_the_self_account() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Telegram)
        .with_self_handle(Platform::Telegram, "me")
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let telegram = harness.adapter(Platform::Telegram);

    telegram
        .emit_message(group(Platform::Telegram, "chat-1", "alice", "hi all", "1", 1000))
        .await;
    telegram
        .emit_message(group(Platform::Telegram, "chat-1", "me", "hi alice", "2", 2000))
        .await;
    harness.wait_for_messages(2).await;

    let store = harness.manager.store();
    let thread = store.list_threads().remove(0);
    assert_eq!(thread.kind, ThreadKind::Group);
    let view = harness.manager.thread(&thread.id, 10).await.unwrap().unwrap();
    let directions: Vec<_> = view
        .messages
        .iter()
        .map(|m| (m.author.handle.as_str(), m.tags.direction()))
        .collect();
    assert_eq!(
        directions,
        vec![
            ("alice", Some(Direction::Incoming)),
            ("me", Some(Direction::Outgoing)),
        ]
    );

    harness.manager.stop().await.unwrap();
}

#[tokio::test]
async fn ingested_messages_are_searchable() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Discord)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let discord = harness.adapter(Platform::Discord);
    discord
        .emit_message(dm(Platform::Discord, "bob", "the ferry leaves at noon", "1", 1000))
        .await;
    discord
        .emit_message(dm(Platform::Discord, "bob", "bring snacks", "2", 2000))
        .await;
    harness.wait_for_messages(2).await;

    let hits = harness
        .manager
        .search("ferry", &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].platform, Platform::Discord);

    let recent = harness.manager.recent(10).await.unwrap();
    assert_eq!(recent[0].content, "bring snacks");

    let stats = harness.manager.stats().await.unwrap();
    assert_eq!(stats.indexed, 2);
    assert!(!stats.index_lagging());

    harness.manager.stop().await.unwrap();
}

// ---- Discovery ----

#[tokio::test]
async fn platform_without_credentials_is_never_started() {
    let telegram = Arc::new(MockAdapter::unauthenticated(Platform::Telegram));
    let harness = TestHarness::builder()
        .with_platform(Platform::Signal)
        .with_adapter(telegram.clone())
        .build()
        .await
        .unwrap();

    let discovered = harness.manager.discover_authenticated_platforms().await;
    assert_eq!(discovered, vec![Platform::Signal]);

    let report = harness.manager.start().await.unwrap();
    assert_eq!(report.started, vec![Platform::Signal]);
    assert_eq!(report.skipped, vec![Platform::Telegram]);
    assert!(report.failed.is_empty());
    assert_eq!(
        report.not_configured,
        vec![Platform::Whatsapp, Platform::Discord, Platform::Email]
    );
    assert_eq!(telegram.start_count(), 0);
    assert_eq!(harness.manager.managed_platforms(), vec![Platform::Signal]);

    harness.manager.stop().await.unwrap();
    assert_eq!(telegram.stop_count(), 0);
}

#[tokio::test]
async fn failed_start_is_reported_not_raised() {
    let whatsapp = Arc::new(MockAdapter::new(Platform::Whatsapp));
    whatsapp.set_fail_start(true);
    let harness = TestHarness::builder()
        .with_adapter(whatsapp.clone())
        .build()
        .await
        .unwrap();

    let report = harness.manager.start().await.unwrap();
    assert!(report.started.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, Platform::Whatsapp);

    let state = harness.manager.state().clone();
    wait_until("error persisted", || {
        let state = state.clone();
        async move {
            state
                .load_platform_state(Platform::Whatsapp)
                .await
                .unwrap()
                .is_some_and(|s| s.error_count == 1 && s.status == ConnectionStatus::Error)
        }
    })
    .await;

    harness.manager.stop().await.unwrap();
}

// ---- Lifecycle ----

#[tokio::test]
async fn unclean_shutdown_is_detected_on_next_start() {
    let dir = tempfile::tempdir().unwrap();

    let first = TestHarness::builder()
        .with_platform(Platform::Signal)
        .in_dir(dir.path())
        .build()
        .await
        .unwrap();
    let report = first.manager.start().await.unwrap();
    assert!(report.previous_clean);
    assert!(!first.manager.state().was_clean_shutdown().await.unwrap());
    // Crash: never stopped.
    drop(first);

    let second = TestHarness::builder()
        .with_platform(Platform::Signal)
        .in_dir(dir.path())
        .build()
        .await
        .unwrap();
    let report = second.manager.start().await.unwrap();
    assert!(!report.previous_clean);
    let stop = second.manager.stop().await.unwrap();
    assert!(stop.clean);
    assert!(second.manager.state().was_clean_shutdown().await.unwrap());
}

#[tokio::test]
async fn stop_disconnects_adapters_and_persists_state() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Email)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    assert!(harness.manager.is_running().await);
    assert!(harness.manager.start().await.is_err());

    let email = harness.adapter(Platform::Email);
    email
        .emit_message(dm(Platform::Email, "ann@example.com", "Agenda\n\nsee attached", "<a@x>", 1000))
        .await;
    harness.wait_for_messages(1).await;

    let stop = harness.manager.stop().await.unwrap();
    assert!(stop.clean);
    assert!(!email.is_running());
    assert_eq!(email.stop_count(), 1);
    assert!(!harness.manager.is_running().await);

    let saved = harness
        .manager
        .state()
        .load_platform_state(Platform::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.status, ConnectionStatus::Disconnected);
    assert_eq!(saved.message_count, 1);
    assert!(saved.last_connected_at.is_some());

    // Stopping again is a no-op.
    assert!(harness.manager.stop().await.unwrap().clean);
}

// ---- Watermarks ----

#[tokio::test]
async fn sync_marker_saves_watermark_with_totals() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Signal)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let signal = harness.adapter(Platform::Signal);
    let state = harness.manager.state().clone();

    signal.emit_message(dm(Platform::Signal, "+15550100", "one", "1", 1000)).await;
    signal.emit_message(dm(Platform::Signal, "+15550100", "two", "2", 2000)).await;
    signal.emit_sync(progress("signal-cli", "all", 2, 2)).await;
    signal.emit_message(dm(Platform::Signal, "+15550100", "three", "3", 3000)).await;
    signal.emit_sync(progress("signal-cli", "all", 3, 1)).await;

    wait_until("second watermark", || {
        let state = state.clone();
        async move {
            state
                .load_sync_state(Platform::Signal, "signal-cli", "all")
                .await
                .unwrap()
                .is_some_and(|s| s.watermark == Watermark::Sequence(3))
        }
    })
    .await;

    let saved = state
        .load_sync_state(Platform::Signal, "signal-cli", "all")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.metadata.get_u64(SyncMetadata::MESSAGES), Some(3));
    assert_eq!(saved.metadata.get_u64(SyncMetadata::BATCHES), Some(2));
    assert!(saved.metadata.get(SyncMetadata::LAST_BATCH_AT).is_some());

    harness.manager.stop().await.unwrap();
}

#[tokio::test]
async fn rejected_message_does_not_hold_the_watermark() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Signal)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let signal = harness.adapter(Platform::Signal);
    let state = harness.manager.state().clone();

    let mut blank_author = dm(Platform::Signal, "+15550100", "who sent this", "1", 1000);
    blank_author.author.handle = "  ".into();
    signal.emit_message(blank_author).await;
    signal.emit_sync(progress("signal-cli", "all", 1, 1)).await;

    wait_until("watermark", || {
        let state = state.clone();
        async move {
            state
                .load_sync_state(Platform::Signal, "signal-cli", "all")
                .await
                .unwrap()
                .is_some()
        }
    })
    .await;
    assert_eq!(harness.manager.store().stats().messages, 0);

    harness.manager.stop().await.unwrap();
}

#[tokio::test]
async fn restart_resumes_from_saved_watermark() {
    let harness = TestHarness::builder()
        .with_platform(Platform::Email)
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let email = harness.adapter(Platform::Email);
    assert_eq!(email.last_resume().unwrap().sync_states.len(), 0);

    email.emit_sync(progress("imap", "INBOX", 42, 0)).await;
    let state = harness.manager.state().clone();
    wait_until("watermark", || {
        let state = state.clone();
        async move {
            state
                .load_sync_state(Platform::Email, "imap", "INBOX")
                .await
                .unwrap()
                .is_some()
        }
    })
    .await;

    harness.manager.restart_platform(Platform::Email).await.unwrap();
    assert_eq!(email.start_count(), 2);
    assert_eq!(email.stop_count(), 1);
    let resume = email.last_resume().unwrap();
    assert_eq!(resume.watermark("imap", "INBOX"), Some(&Watermark::Sequence(42)));

    assert!(harness.manager.restart_platform(Platform::Signal).await.is_err());
    harness.manager.stop().await.unwrap();
}

// ---- Health ----

fn fast_health() -> HealthPolicy {
    HealthPolicy {
        check_interval: Duration::from_millis(50),
        stale_threshold: chrono::Duration::hours(1),
        error_window: chrono::Duration::minutes(15),
        error_threshold: 3,
    }
}

#[tokio::test]
async fn unhealthy_platform_is_restarted_by_backoff_policy() {
    let policy = Arc::new(BackoffRestart::new(3, Duration::from_millis(10)));
    let harness = TestHarness::builder()
        .with_platform(Platform::Signal)
        .with_health_policy(fast_health())
        .with_restart_policy(policy.clone())
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let signal = harness.adapter(Platform::Signal).clone();

    signal.emit_error("connection reset").await;
    assert_eq!(signal.status(), ConnectionStatus::Error);

    wait_until("restart", || {
        let signal = signal.clone();
        async move { signal.start_count() >= 2 }
    })
    .await;
    wait_until("recovery resets attempts", || {
        let policy = policy.clone();
        async move { policy.attempts(Platform::Signal) == 0 }
    })
    .await;
    assert_eq!(signal.status(), ConnectionStatus::Connected);

    harness.manager.stop().await.unwrap();
}

#[tokio::test]
async fn quiet_platform_is_not_restarted() {
    let policy = Arc::new(BackoffRestart::new(3, Duration::from_millis(10)));
    let harness = TestHarness::builder()
        .with_platform(Platform::Discord)
        .with_health_policy(fast_health())
        .with_restart_policy(policy.clone())
        .build()
        .await
        .unwrap();
    harness.manager.start().await.unwrap();

    let report = harness.manager.check_health().await;
    assert_eq!(report.overall, OverallHealth::Healthy);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.adapter(Platform::Discord).start_count(), 1);
    assert_eq!(policy.attempts(Platform::Discord), 0);

    harness.manager.stop().await.unwrap();
}
