// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The platform adapter trait every message source implements.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChorusError;
use crate::event::{AdapterEvent, AdapterStats, EventHub};
use crate::types::{ConnectionStatus, Platform, Resume};

/// A long-lived connection to one messaging platform.
///
/// Adapters never touch the store: they only report what they see through
/// their [`EventHub`]. Lifecycle follows
/// `disconnected -> connecting -> connected -> (error -> connecting | disconnected)`.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + 'static {
    /// The platform this adapter syncs.
    fn platform(&self) -> Platform;

    /// Whether usable credentials are present locally. Must not touch the
    /// network; returns `false` rather than erroring when nothing is found.
    async fn is_authenticated(&self) -> bool;

    /// Starts syncing from `resume`. Calling it on a running adapter is a
    /// no-op. On failure an `Error` event is emitted and the adapter stays
    /// not connected.
    async fn start(&self, resume: Resume) -> Result<(), ChorusError>;

    /// Stops syncing. Safe to call when never started, and more than once.
    async fn stop(&self) -> Result<(), ChorusError>;

    /// Current connection status.
    fn status(&self) -> ConnectionStatus {
        self.events().status()
    }

    /// The hub this adapter emits through.
    fn events(&self) -> &EventHub;

    fn subscribe(&self) -> mpsc::Receiver<AdapterEvent> {
        self.events().subscribe()
    }

    fn stats(&self) -> AdapterStats {
        self.events().stats()
    }
}

/// The adapters a daemon runs, one per platform.
pub type AdapterMap = BTreeMap<Platform, Arc<dyn PlatformAdapter>>;
