// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter events and the fan-out hub every adapter emits through.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{ConnectionStatus, MessageKind, SyncMetadata, Tags, ThreadKind, Watermark};

/// Per-subscriber channel capacity.
pub const EVENT_CHANNEL_CAPACITY: usize = 512;

/// A conversation participant as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Platform-native description of the conversation a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    pub conversation_id: String,
    pub title: String,
    pub kind: ThreadKind,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// A message normalized by a platform profile, before account and thread
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Platform-native message id.
    pub platform_id: String,
    pub author: Participant,
    pub thread: ThreadDescriptor,
    /// Platform-native id of the message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

/// A completed sync batch for one `(source, scope)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub source: String,
    pub scope: String,
    pub watermark: Watermark,
    #[serde(default)]
    pub metadata: SyncMetadata,
    /// Messages emitted since the previous progress marker for this scope.
    pub count: u64,
}

/// Everything an adapter reports to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Message(NormalizedMessage),
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    Sync(SyncProgress),
}

/// Counters derived purely from emitted events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStats {
    pub status: ConnectionStatus,
    pub message_count: u64,
    pub error_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub connected: bool,
}

impl AdapterStats {
    fn observe(&mut self, event: &AdapterEvent) {
        let now = Utc::now();
        match event {
            AdapterEvent::Message(_) => {
                self.message_count += 1;
                self.last_message_at = Some(now);
            }
            AdapterEvent::Connected => {
                self.connected = true;
                self.status = ConnectionStatus::Connected;
            }
            AdapterEvent::Disconnected { .. } => {
                self.connected = false;
                self.status = ConnectionStatus::Disconnected;
            }
            AdapterEvent::Error { message } => {
                self.error_count += 1;
                self.last_error_at = Some(now);
                self.last_error = Some(message.clone());
                self.connected = false;
                self.status = ConnectionStatus::Error;
            }
            AdapterEvent::Sync(_) => {}
        }
    }
}

#[derive(Default)]
struct HubInner {
    subscribers: Vec<mpsc::Sender<AdapterEvent>>,
    stats: AdapterStats,
}

/// Fans adapter events out to any number of subscribers.
///
/// Closed subscribers are pruned on the next emit. Stats are updated
/// before delivery, so a subscriber that has seen an event can rely on
/// [`stats`](Self::stats) reflecting it.
#[derive(Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> mpsc::Receiver<AdapterEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.lock().subscribers.push(tx);
        rx
    }

    /// Updates stats and delivers `event` to every live subscriber.
    ///
    /// Waits for channel capacity, so a slow subscriber applies
    /// backpressure to the emitting adapter.
    pub async fn emit(&self, event: AdapterEvent) {
        let senders = {
            let mut inner = self.lock();
            inner.stats.observe(&event);
            inner.subscribers.clone()
        };

        let mut closed = false;
        for tx in &senders {
            if tx.send(event.clone()).await.is_err() {
                closed = true;
            }
        }

        if closed {
            self.lock().subscribers.retain(|tx| !tx.is_closed());
        }
    }

    /// Marks the adapter as connecting without emitting an event.
    pub fn set_connecting(&self) {
        let mut inner = self.lock();
        inner.stats.status = ConnectionStatus::Connecting;
        inner.stats.connected = false;
    }

    /// Marks the adapter as disconnected without emitting an event.
    pub fn set_disconnected(&self) {
        let mut inner = self.lock();
        inner.stats.status = ConnectionStatus::Disconnected;
        inner.stats.connected = false;
    }

    pub fn stats(&self) -> AdapterStats {
        self.lock().stats.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().stats.status
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        // A panicked emitter cannot leave the counters half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
