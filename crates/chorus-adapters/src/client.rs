// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary to an external platform sync client.

use async_trait::async_trait;
use chorus_core::{AdapterEvent, ChorusError, EventHub, Resume, SyncProgress};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::PlatformProfile;

/// What a sync client reports, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent<R> {
    Record(R),
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    Sync(SyncProgress),
}

/// A producer of platform records.
///
/// `start` hands the client the sending half of its event channel. The
/// client owns it until it stops; dropping every sender ends forwarding.
#[async_trait]
pub trait SyncClient: Send + Sync + 'static {
    type Record: Send + 'static;

    async fn start(
        &self,
        resume: Resume,
        events: mpsc::Sender<ClientEvent<Self::Record>>,
    ) -> Result<(), ChorusError>;

    async fn stop(&self) -> Result<(), ChorusError>;
}

/// Normalizes client events through `profile` and emits them on `hub` until
/// the client drops its sender.
///
/// Records the profile rejects are logged and skipped. The `count` of each
/// forwarded [`SyncProgress`] is replaced by the number of messages actually
/// emitted since the previous marker.
pub async fn forward_events<P: PlatformProfile>(
    profile: &P,
    mut events: mpsc::Receiver<ClientEvent<P::Record>>,
    hub: &EventHub,
) {
    let platform = profile.platform();
    let mut since_marker: u64 = 0;

    while let Some(event) = events.recv().await {
        let event = match event {
            ClientEvent::Record(record) => match profile.normalize(record) {
                Ok(Some(message)) => {
                    since_marker += 1;
                    AdapterEvent::Message(message)
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(platform = %platform, error = %e, "skipping record that failed to normalize");
                    continue;
                }
            },
            ClientEvent::Connected => AdapterEvent::Connected,
            ClientEvent::Disconnected { reason } => AdapterEvent::Disconnected { reason },
            ClientEvent::Error { message } => AdapterEvent::Error { message },
            ClientEvent::Sync(mut progress) => {
                progress.count = std::mem::take(&mut since_marker);
                AdapterEvent::Sync(progress)
            }
        };
        hub.emit(event).await;
    }
    debug!(platform = %platform, "client event stream ended");
}
