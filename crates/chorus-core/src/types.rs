// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, state manager, adapters and orchestrator.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ChorusError;

/// A messaging platform the daemon can sync from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Signal,
    Telegram,
    Whatsapp,
    Discord,
    Email,
}

impl Platform {
    /// Every supported platform, in discovery order.
    pub const ALL: [Platform; 5] = [
        Platform::Signal,
        Platform::Telegram,
        Platform::Whatsapp,
        Platform::Discord,
        Platform::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Signal => "signal",
            Platform::Telegram => "telegram",
            Platform::Whatsapp => "whatsapp",
            Platform::Discord => "discord",
            Platform::Email => "email",
        }
    }
}

/// Category of a stored message. Part of the content-derived id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    SignalMessage,
    TelegramMessage,
    WhatsappMessage,
    DiscordMessage,
    Email,
}

impl MessageKind {
    /// The default kind for messages arriving from `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Signal => MessageKind::SignalMessage,
            Platform::Telegram => MessageKind::TelegramMessage,
            Platform::Whatsapp => MessageKind::WhatsappMessage,
            Platform::Discord => MessageKind::DiscordMessage,
            Platform::Email => MessageKind::Email,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::SignalMessage => "signal_message",
            MessageKind::TelegramMessage => "telegram_message",
            MessageKind::WhatsappMessage => "whatsapp_message",
            MessageKind::DiscordMessage => "discord_message",
            MessageKind::Email => "email",
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Stable account id derived from platform + normalized handle.
    AccountId
);
string_id!(
    /// Stable thread id derived from platform + native conversation id.
    ThreadId
);
string_id!(
    /// Content-derived message id.
    MessageId
);

/// A `(platform, handle)` pair naming a participant on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub platform: Platform,
    pub handle: String,
}

/// Mutable per-account statistics, maintained as a side effect of ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub message_count: u64,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// A participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub identities: Vec<Identity>,
    pub is_self: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: AccountStats,
}

impl Account {
    /// The identity the account was created from.
    pub fn primary_identity(&self) -> Option<&Identity> {
        self.identities.first()
    }

    pub fn has_identity(&self, platform: Platform, handle: &str) -> bool {
        self.identities
            .iter()
            .any(|i| i.platform == platform && i.handle == handle)
    }
}

/// Conversation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Dm,
    Group,
    Channel,
}

/// Where a thread lives on its platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadSource {
    pub platform: Platform,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub message_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A conversation: a DM, a group, or a named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    pub kind: ThreadKind,
    pub participants: Vec<AccountId>,
    pub source: ThreadSource,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: ThreadStats,
}

/// Author display snapshot taken at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRefs {
    pub thread_id: ThreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

/// `(platform, platform-native message id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageSource {
    pub platform: Platform,
    pub platform_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
}

/// Message direction relative to the self account of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Ordered key/value tags attached to a message.
///
/// Known keys are exposed as associated constants; unknown keys are kept
/// verbatim and in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    /// `incoming` or `outgoing`, set by the ingest pipeline only.
    pub const DIRECTION: &'static str = "direction";
    /// IMAP mailbox the message was found in.
    pub const MAILBOX: &'static str = "mailbox";
    /// Email subject line.
    pub const SUBJECT: &'static str = "subject";
    /// Native group or guild id.
    pub const GROUP: &'static str = "group";
    /// Set when the platform reported the message as edited.
    pub const EDITED: &'static str = "edited";
    /// Name of the import path (`live`, `backup`, ...).
    pub const IMPORT: &'static str = "import";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key`, replacing an existing value in place so order is stable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn direction(&self) -> Option<Direction> {
        self.get(Self::DIRECTION).and_then(|v| v.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The atomic stored unit. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: String,
    pub account_id: AccountId,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub imported_at: DateTime<Utc>,
    pub refs: MessageRefs,
    pub source: MessageSource,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Connection status of a platform adapter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Persisted per-platform connection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformState {
    pub platform: Platform,
    pub status: ConnectionStatus,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub message_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl PlatformState {
    /// A fresh, never-connected state.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            status: ConnectionStatus::Disconnected,
            last_connected_at: None,
            last_message_at: None,
            last_error: None,
            last_error_at: None,
            error_count: 0,
            message_count: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Typed ingestion progress marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Watermark {
    Timestamp(DateTime<Utc>),
    Sequence(i64),
    /// Opaque platform cursor. Cannot be ordered, so it always replaces.
    Cursor(String),
}

impl Watermark {
    pub fn kind(&self) -> &'static str {
        match self {
            Watermark::Timestamp(_) => "timestamp",
            Watermark::Sequence(_) => "sequence",
            Watermark::Cursor(_) => "cursor",
        }
    }

    /// Column encoding of the value part.
    pub fn encode_value(&self) -> String {
        match self {
            Watermark::Timestamp(ts) => ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            Watermark::Sequence(n) => n.to_string(),
            Watermark::Cursor(c) => c.clone(),
        }
    }

    /// Inverse of [`kind`](Self::kind) + [`encode_value`](Self::encode_value).
    pub fn decode(kind: &str, value: &str) -> Result<Self, ChorusError> {
        match kind {
            "timestamp" => DateTime::parse_from_rfc3339(value)
                .map(|ts| Watermark::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| ChorusError::Validation(format!("bad timestamp watermark `{value}`: {e}"))),
            "sequence" => value
                .parse()
                .map(Watermark::Sequence)
                .map_err(|e| ChorusError::Validation(format!("bad sequence watermark `{value}`: {e}"))),
            "cursor" => Ok(Watermark::Cursor(value.to_string())),
            other => Err(ChorusError::Validation(format!(
                "unknown watermark kind `{other}`"
            ))),
        }
    }

    /// True when `self` would move progress backwards relative to `current`.
    ///
    /// Cursors and watermarks of a different kind are never considered behind.
    pub fn is_behind(&self, current: &Watermark) -> bool {
        match (self, current) {
            (Watermark::Timestamp(new), Watermark::Timestamp(old)) => new < old,
            (Watermark::Sequence(new), Watermark::Sequence(old)) => new < old,
            _ => false,
        }
    }
}

/// Free-form sync metadata with documented known keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncMetadata(BTreeMap<String, serde_json::Value>);

impl SyncMetadata {
    /// Total messages synced in this scope.
    pub const MESSAGES: &'static str = "messages";
    /// Number of completed batches.
    pub const BATCHES: &'static str = "batches";
    /// RFC 3339 time of the last completed batch.
    pub const LAST_BATCH_AT: &'static str = "last_batch_at";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(|v| v.as_u64())
    }

    /// Overlays `other` on top of `self`.
    pub fn merge(&mut self, other: &SyncMetadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resumable watermark keyed by `(platform, source, scope)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub id: String,
    pub platform: Platform,
    pub source: String,
    pub scope: String,
    pub watermark: Watermark,
    #[serde(default)]
    pub metadata: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(
        platform: Platform,
        source: impl Into<String>,
        scope: impl Into<String>,
        watermark: Watermark,
    ) -> Self {
        let source = source.into();
        let scope = scope.into();
        Self {
            id: Self::key(platform, &source, &scope),
            platform,
            source,
            scope,
            watermark,
            metadata: SyncMetadata::new(),
            updated_at: Utc::now(),
        }
    }

    /// Canonical id for a `(platform, source, scope)` triple.
    ///
    /// `%` and `:` inside `source` and `scope` are percent-escaped, so
    /// distinct triples never share an id.
    pub fn key(platform: Platform, source: &str, scope: &str) -> String {
        format!("{platform}:{}:{}", escape_key_part(source), escape_key_part(scope))
    }
}

fn escape_key_part(part: &str) -> Cow<'_, str> {
    if !part.contains(['%', ':']) {
        return Cow::Borrowed(part);
    }
    let mut escaped = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// One row of the rolling health-check history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    pub id: i64,
    pub platform: Platform,
    pub healthy: bool,
    /// Whether the platform was connected when checked.
    pub connected: bool,
    pub issues: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Where an adapter should pick up from after a restart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resume {
    pub sync_states: Vec<SyncState>,
    /// Legacy single-value cursor.
    pub cursor: Option<String>,
}

impl Resume {
    pub fn watermark(&self, source: &str, scope: &str) -> Option<&Watermark> {
        self.sync_states
            .iter()
            .find(|s| s.source == source && s.scope == scope)
            .map(|s| &s.watermark)
    }
}
