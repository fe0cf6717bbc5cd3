// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the state manager.

use chorus_core::{ConnectionStatus, Platform, PlatformState, SyncMetadata, SyncState, Watermark};
use chorus_state::{StateManager, StateOptions};
use chrono::{Duration, TimeZone, Utc};

async fn open(dir: &tempfile::TempDir) -> StateManager {
    StateManager::open(&dir.path().join("state.db"), StateOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn platform_state_round_trips_through_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let connected_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    {
        let state = open(&dir).await;
        let mut snapshot = PlatformState::new(Platform::Telegram);
        snapshot.status = ConnectionStatus::Connected;
        snapshot.last_connected_at = Some(connected_at);
        snapshot.message_count = 42;
        snapshot.error_count = 1;
        snapshot.last_error = Some("flood wait".into());
        state.save_platform_state(&snapshot).await.unwrap();
        state.close().await.unwrap();
    }

    let state = open(&dir).await;
    let loaded = state
        .load_platform_state(Platform::Telegram)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status, ConnectionStatus::Connected);
    assert_eq!(loaded.last_connected_at, Some(connected_at));
    assert_eq!(loaded.message_count, 42);
    assert_eq!(loaded.last_error.as_deref(), Some("flood wait"));

    assert!(state.load_platform_state(Platform::Email).await.unwrap().is_none());
    assert_eq!(state.load_all_platform_states().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sequence_watermarks_never_move_backwards() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();

    let at = |n| SyncState::new(Platform::Telegram, "channel", "chat-1", Watermark::Sequence(n));
    assert!(state.save_sync_state(&at(100)).await.unwrap());
    assert!(state.save_sync_state(&at(150)).await.unwrap());
    assert!(!state.save_sync_state(&at(120)).await.unwrap());

    let loaded = state
        .load_sync_state(Platform::Telegram, "channel", "chat-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.watermark, Watermark::Sequence(150));
}

#[tokio::test]
async fn timestamp_watermarks_are_monotonic_and_cursors_replace() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    let ts = |t| SyncState::new(Platform::Email, "imap", "INBOX", Watermark::Timestamp(t));
    assert!(state.save_sync_state(&ts(t0)).await.unwrap());
    assert!(!state.save_sync_state(&ts(t0 - Duration::hours(1))).await.unwrap());

    let cursor = |c: &str| SyncState::new(Platform::Discord, "spool", "all", Watermark::Cursor(c.into()));
    assert!(state.save_sync_state(&cursor("b.jsonl:10")).await.unwrap());
    assert!(state.save_sync_state(&cursor("a.jsonl:0")).await.unwrap());
    let loaded = state
        .load_sync_state(Platform::Discord, "spool", "all")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.watermark, Watermark::Cursor("a.jsonl:0".into()));
}

#[tokio::test]
async fn sync_states_are_scoped_and_keep_metadata() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();

    let mut inbox = SyncState::new(Platform::Email, "imap", "INBOX", Watermark::Sequence(10));
    inbox.metadata.set(SyncMetadata::MESSAGES, 10u64);
    inbox.metadata.set(SyncMetadata::BATCHES, 1u64);
    let sent = SyncState::new(Platform::Email, "imap", "Sent", Watermark::Sequence(3));
    state.save_sync_state(&inbox).await.unwrap();
    state.save_sync_state(&sent).await.unwrap();

    let all = state.load_platform_sync_states(Platform::Email).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].scope, "INBOX");
    assert_eq!(all[0].metadata.get_u64(SyncMetadata::MESSAGES), Some(10));
    assert_eq!(all[0].id, "email:imap:INBOX");

    let resume = state.load_resume(Platform::Email).await.unwrap();
    assert_eq!(resume.watermark("imap", "Sent"), Some(&Watermark::Sequence(3)));
    assert!(state.load_platform_sync_states(Platform::Signal).await.unwrap().is_empty());
}

#[tokio::test]
async fn watermarks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let saved = SyncState::new(Platform::Email, "imap", "INBOX", Watermark::Sequence(42));
    {
        let state = open(&dir).await;
        assert!(state.save_sync_state(&saved).await.unwrap());
        state.close().await.unwrap();
    }

    let state = open(&dir).await;
    let loaded = state
        .load_sync_state(Platform::Email, "imap", "INBOX")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.id, saved.id);
    assert_eq!(loaded.watermark, Watermark::Sequence(42));

    let resume = state.load_resume(Platform::Email).await.unwrap();
    assert_eq!(resume.watermark("imap", "INBOX"), Some(&Watermark::Sequence(42)));
    let stale = SyncState::new(Platform::Email, "imap", "INBOX", Watermark::Sequence(41));
    assert!(!state.save_sync_state(&stale).await.unwrap());
}

#[tokio::test]
async fn colons_in_source_and_scope_do_not_collide() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();
    let left = SyncState::new(Platform::Discord, "spool:a", "b", Watermark::Sequence(1));
    let right = SyncState::new(Platform::Discord, "spool", "a:b", Watermark::Sequence(2));
    assert_ne!(left.id, right.id);
    assert!(state.save_sync_state(&left).await.unwrap());
    assert!(state.save_sync_state(&right).await.unwrap());

    let all = state.load_platform_sync_states(Platform::Discord).await.unwrap();
    assert_eq!(all.len(), 2);
    let resume = state.load_resume(Platform::Discord).await.unwrap();
    assert_eq!(resume.watermark("spool:a", "b"), Some(&Watermark::Sequence(1)));
    assert_eq!(resume.watermark("spool", "a:b"), Some(&Watermark::Sequence(2)));
}

#[tokio::test]
async fn legacy_cursor_overwrites() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();
    assert_eq!(state.load_sync_cursor(Platform::Signal).await.unwrap(), None);
    state.save_sync_cursor(Platform::Signal, "100").await.unwrap();
    state.save_sync_cursor(Platform::Signal, "50").await.unwrap();
    assert_eq!(
        state.load_sync_cursor(Platform::Signal).await.unwrap().as_deref(),
        Some("50")
    );
}

#[tokio::test]
async fn unclean_shutdown_is_detected_on_next_start() {
    let dir = tempfile::tempdir().unwrap();

    let state = open(&dir).await;
    let first = state.record_start().await.unwrap();
    assert!(first.previous_clean);
    assert!(first.previous_started_at.is_none());
    assert!(!state.was_clean_shutdown().await.unwrap());
    // Crash: no record_shutdown.
    drop(state);

    let state = open(&dir).await;
    let second = state.record_start().await.unwrap();
    assert!(!second.previous_clean);
    assert!(second.previous_started_at.is_some());
    state.record_shutdown(true).await.unwrap();
    assert!(state.was_clean_shutdown().await.unwrap());
    state.close().await.unwrap();

    let state = open(&dir).await;
    assert!(state.record_start().await.unwrap().previous_clean);
}

#[tokio::test]
async fn health_history_is_pruned_per_platform() {
    let options = StateOptions {
        health_history_limit: 3,
        ..StateOptions::default()
    };
    let state = StateManager::open_in_memory(options).await.unwrap();

    for i in 0..5 {
        state
            .record_health_check(Platform::Signal, i % 2 == 0, true, &[format!("check {i}")])
            .await
            .unwrap();
    }
    state
        .record_health_check(Platform::Email, true, true, &[])
        .await
        .unwrap();

    let signal = state.recent_health_checks(Platform::Signal, 10).await.unwrap();
    assert_eq!(signal.len(), 3);
    assert_eq!(signal[0].issues, vec!["check 4".to_string()]);
    assert!(signal[0].id > signal[1].id);
    assert_eq!(state.recent_health_checks(Platform::Email, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn counts_connection_failures_in_window() {
    let state = StateManager::open_in_memory(StateOptions::default()).await.unwrap();
    let before = Utc::now() - Duration::seconds(1);

    state.record_health_check(Platform::Whatsapp, false, false, &["down".into()]).await.unwrap();
    state.record_health_check(Platform::Whatsapp, true, true, &[]).await.unwrap();
    state.record_health_check(Platform::Whatsapp, false, false, &["down".into()]).await.unwrap();
    // Unhealthy by threshold alone while connected.
    state
        .record_health_check(Platform::Whatsapp, false, true, &["too many failures".into()])
        .await
        .unwrap();

    assert_eq!(
        state.count_connection_failures_since(Platform::Whatsapp, before).await.unwrap(),
        2
    );
    assert_eq!(
        state
            .count_connection_failures_since(Platform::Whatsapp, Utc::now() + Duration::minutes(1))
            .await
            .unwrap(),
        0
    );

    let recent = state.recent_health_checks(Platform::Whatsapp, 1).await.unwrap();
    assert!(!recent[0].healthy);
    assert!(recent[0].connected);
}
