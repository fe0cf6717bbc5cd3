// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter for deterministic testing.
//!
//! `MockAdapter` implements `PlatformAdapter` with injectable events and
//! records every start (with its resume point) and stop for assertion.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chorus_core::{
    AdapterEvent, ChorusError, EventHub, NormalizedMessage, Platform, PlatformAdapter, Resume,
    SyncProgress,
};

/// A scriptable adapter for one platform.
pub struct MockAdapter {
    platform: Platform,
    hub: EventHub,
    authenticated: AtomicBool,
    fail_start: AtomicBool,
    running: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
    resumes: Mutex<Vec<Resume>>,
}

impl MockAdapter {
    /// An authenticated adapter that starts successfully.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            hub: EventHub::new(),
            authenticated: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            running: AtomicBool::new(false),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
            resumes: Mutex::new(Vec::new()),
        }
    }

    /// An adapter with no stored credentials.
    pub fn unauthenticated(platform: Platform) -> Self {
        let adapter = Self::new(platform);
        adapter.set_authenticated(false);
        adapter
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Makes every following `start` fail until reset.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Emits an arbitrary event to subscribers.
    pub async fn emit(&self, event: AdapterEvent) {
        self.hub.emit(event).await;
    }

    pub async fn emit_message(&self, message: NormalizedMessage) {
        self.emit(AdapterEvent::Message(message)).await;
    }

    pub async fn emit_sync(&self, progress: SyncProgress) {
        self.emit(AdapterEvent::Sync(progress)).await;
    }

    pub async fn emit_error(&self, message: &str) {
        self.emit(AdapterEvent::Error {
            message: message.to_string(),
        })
        .await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Successful starts so far.
    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Resume point handed to the most recent successful start.
    pub fn last_resume(&self) -> Option<Resume> {
        self.resumes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn start(&self, resume: Resume) -> Result<(), ChorusError> {
        if self.is_running() {
            return Ok(());
        }
        self.hub.set_connecting();
        if self.fail_start.load(Ordering::SeqCst) {
            let err = ChorusError::platform(self.platform, "mock start failure");
            self.emit_error(&err.to_string()).await;
            return Err(err);
        }
        self.resumes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(resume);
        self.running.store(true, Ordering::SeqCst);
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.emit(AdapterEvent::Connected).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChorusError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.running.swap(false, Ordering::SeqCst) {
            self.emit(AdapterEvent::Disconnected {
                reason: "stopped".to_string(),
            })
            .await;
        }
        Ok(())
    }

    fn events(&self) -> &EventHub {
        &self.hub
    }
}
