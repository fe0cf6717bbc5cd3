// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generic [`PlatformAdapter`] built from a profile and a client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chorus_core::event::EVENT_CHANNEL_CAPACITY;
use chorus_core::{
    AdapterEvent, ChorusError, EventHub, NormalizedMessage, Platform, PlatformAdapter, Resume,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{SyncClient, forward_events};

/// How long `stop` waits for already-queued client events to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Platform knowledge: credential probing and record normalization.
///
/// Profiles never decide message direction.
pub trait PlatformProfile: Send + Sync + 'static {
    type Record: Send + 'static;

    fn platform(&self) -> Platform;

    /// Local-only check for usable credentials or a paired session.
    fn has_credentials(&self) -> bool;

    /// `Ok(None)` for records that carry no message (receipts, typing
    /// notifications, empty bodies).
    fn normalize(&self, record: Self::Record) -> Result<Option<NormalizedMessage>, ChorusError>;
}

/// A [`PlatformAdapter`] composed of a profile and a sync client.
pub struct SyncAdapter<P, C> {
    profile: Arc<P>,
    client: C,
    hub: Arc<EventHub>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl<P, C> SyncAdapter<P, C>
where
    P: PlatformProfile,
    C: SyncClient<Record = P::Record>,
{
    pub fn new(profile: P, client: C) -> Self {
        Self {
            profile: Arc::new(profile),
            client,
            hub: Arc::new(EventHub::new()),
            forwarder: Mutex::new(None),
        }
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<P, C> PlatformAdapter for SyncAdapter<P, C>
where
    P: PlatformProfile,
    C: SyncClient<Record = P::Record>,
{
    fn platform(&self) -> Platform {
        self.profile.platform()
    }

    async fn is_authenticated(&self) -> bool {
        self.profile.has_credentials()
    }

    async fn start(&self, resume: Resume) -> Result<(), ChorusError> {
        let mut forwarder = self.forwarder.lock().await;
        if forwarder.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(platform = %self.platform(), "adapter already running");
            return Ok(());
        }

        self.hub.set_connecting();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let profile = self.profile.clone();
        let hub = self.hub.clone();
        let handle = tokio::spawn(async move {
            forward_events(profile.as_ref(), rx, &hub).await;
        });

        if let Err(e) = self.client.start(resume, tx).await {
            warn!(platform = %self.platform(), error = %e, "sync client failed to start");
            handle.abort();
            self.hub
                .emit(AdapterEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return Err(e);
        }

        info!(platform = %self.platform(), "adapter started");
        *forwarder = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChorusError> {
        let Some(mut handle) = self.forwarder.lock().await.take() else {
            return Ok(());
        };

        let stopped = self.client.stop().await;
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
            warn!(platform = %self.platform(), "event forwarder did not drain, aborting");
            handle.abort();
        }
        self.hub
            .emit(AdapterEvent::Disconnected {
                reason: "stopped".into(),
            })
            .await;
        info!(platform = %self.platform(), "adapter stopped");
        stopped
    }

    fn events(&self) -> &EventHub {
        &self.hub
    }
}
