// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-platform event pump: adapter events into the store and state database.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chorus_core::{
    AdapterEvent, ChorusError, ConnectionStatus, Platform, PlatformState, SyncMetadata,
    SyncProgress, SyncState,
};
use chorus_state::StateManager;
use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;

/// In-memory platform snapshots, flushed to the state database.
#[derive(Default)]
pub(crate) struct StateBook {
    states: Mutex<BTreeMap<Platform, PlatformState>>,
}

impl StateBook {
    pub(crate) fn load(&self, states: Vec<PlatformState>) {
        let mut book = self.lock();
        for state in states {
            book.insert(state.platform, state);
        }
    }

    /// Applies `f` to the snapshot of `platform` and returns a copy.
    pub(crate) fn update(
        &self,
        platform: Platform,
        f: impl FnOnce(&mut PlatformState),
    ) -> PlatformState {
        let mut book = self.lock();
        let state = book
            .entry(platform)
            .or_insert_with(|| PlatformState::new(platform));
        f(state);
        state.updated_at = Utc::now();
        state.clone()
    }

    pub(crate) fn get(&self, platform: Platform) -> Option<PlatformState> {
        self.lock().get(&platform).cloned()
    }

    pub(crate) fn all(&self) -> Vec<PlatformState> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Platform, PlatformState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drains one adapter's events.
///
/// Watermarks are only persisted while every message since the adapter
/// last (re)connected has been stored. After a failed message the pump
/// holds all further watermarks until the adapter disconnects, so the
/// next start replays from the last safe point.
pub(crate) struct Pump {
    pub(crate) platform: Platform,
    pub(crate) ingestor: Arc<Ingestor>,
    pub(crate) state: Arc<StateManager>,
    pub(crate) book: Arc<StateBook>,
    batch_ok: bool,
}

impl Pump {
    pub(crate) fn new(
        platform: Platform,
        ingestor: Arc<Ingestor>,
        state: Arc<StateManager>,
        book: Arc<StateBook>,
    ) -> Self {
        Self {
            platform,
            ingestor,
            state,
            book,
            batch_ok: true,
        }
    }

    /// Runs until the adapter hub closes or `cancel` fires. On cancel the
    /// events already queued are still handled.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::Receiver<AdapterEvent>,
        cancel: CancellationToken,
    ) {
        debug!(platform = %self.platform, "event pump started");
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                _ = cancel.cancelled() => {
                    let mut drained = 0usize;
                    while let Ok(event) = events.try_recv() {
                        self.handle(event).await;
                        drained += 1;
                    }
                    debug!(platform = %self.platform, drained, "event pump draining on stop");
                    break;
                }
            }
        }
        self.persist_state().await;
        debug!(platform = %self.platform, "event pump stopped");
    }

    async fn handle(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Message(message) => {
                match self.ingestor.ingest(self.platform, &message).await {
                    Ok(_) => {
                        self.book.update(self.platform, |s| {
                            s.message_count += 1;
                            s.last_message_at = Some(Utc::now());
                        });
                    }
                    Err(ChorusError::Validation(reason)) => {
                        warn!(
                            platform = %self.platform,
                            platform_id = %message.platform_id,
                            reason = %reason,
                            "message rejected"
                        );
                    }
                    Err(e) => {
                        self.batch_ok = false;
                        warn!(
                            platform = %self.platform,
                            platform_id = %message.platform_id,
                            error = %e,
                            "message not stored; holding watermarks"
                        );
                    }
                }
            }
            AdapterEvent::Connected => {
                info!(platform = %self.platform, "platform connected");
                self.book.update(self.platform, |s| {
                    s.status = ConnectionStatus::Connected;
                    s.last_connected_at = Some(Utc::now());
                });
                self.persist_state().await;
            }
            AdapterEvent::Disconnected { reason } => {
                info!(platform = %self.platform, reason = %reason, "platform disconnected");
                self.batch_ok = true;
                self.book.update(self.platform, |s| {
                    s.status = ConnectionStatus::Disconnected;
                });
                self.persist_state().await;
            }
            AdapterEvent::Error { message } => {
                warn!(platform = %self.platform, error = %message, "platform error");
                self.book.update(self.platform, |s| {
                    s.status = ConnectionStatus::Error;
                    s.error_count += 1;
                    s.last_error_at = Some(Utc::now());
                    s.last_error = Some(message);
                });
                self.persist_state().await;
            }
            AdapterEvent::Sync(progress) => {
                if self.batch_ok {
                    self.save_watermark(progress).await;
                } else {
                    warn!(
                        platform = %self.platform,
                        source = %progress.source,
                        scope = %progress.scope,
                        "earlier message failed, watermark not saved"
                    );
                }
                self.persist_state().await;
            }
        }
    }

    async fn save_watermark(&self, progress: SyncProgress) {
        let previous = match self
            .state
            .load_sync_state(self.platform, &progress.source, &progress.scope)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                warn!(platform = %self.platform, error = %e, "failed to load sync state");
                None
            }
        };
        let totals = previous.map(|p| p.metadata).unwrap_or_default();

        let mut sync = SyncState::new(
            self.platform,
            progress.source,
            progress.scope,
            progress.watermark,
        );
        sync.metadata = progress.metadata;
        sync.metadata.set(
            SyncMetadata::MESSAGES,
            totals.get_u64(SyncMetadata::MESSAGES).unwrap_or(0) + progress.count,
        );
        sync.metadata.set(
            SyncMetadata::BATCHES,
            totals.get_u64(SyncMetadata::BATCHES).unwrap_or(0) + 1,
        );
        sync.metadata.set(
            SyncMetadata::LAST_BATCH_AT,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        match self.state.save_sync_state(&sync).await {
            Ok(true) => debug!(
                platform = %self.platform,
                scope = %sync.scope,
                watermark = %sync.watermark.encode_value(),
                count = progress.count,
                "watermark saved"
            ),
            Ok(false) => debug!(
                platform = %self.platform,
                scope = %sync.scope,
                "watermark behind stored value, kept stored"
            ),
            Err(e) => warn!(platform = %self.platform, error = %e, "failed to save watermark"),
        }
    }

    async fn persist_state(&self) {
        let Some(snapshot) = self.book.get(self.platform) else {
            return;
        };
        if let Err(e) = self.state.save_platform_state(&snapshot).await {
            warn!(platform = %self.platform, error = %e, "failed to save platform state");
        }
    }
}
