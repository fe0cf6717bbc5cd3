// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal, via signal-cli JSON envelopes.
//!
//! Incoming data messages are authored by the envelope source. Messages
//! sent from another linked device arrive as sync "sent" messages and are
//! authored by the local account.

use std::path::PathBuf;

use chorus_core::{
    ChorusError, MessageKind, NormalizedMessage, Participant, Platform, Tags, ThreadDescriptor,
    ThreadKind,
};
use serde::Deserialize;

use super::{from_millis, non_blank, non_empty_file};
use crate::adapter::PlatformProfile;

/// One line of `signal-cli --output=json receive`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub envelope: Envelope,
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_number: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub data_message: Option<DataMessage>,
    #[serde(default)]
    pub sync_message: Option<SyncMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    #[serde(default)]
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    #[serde(default)]
    pub sent_message: Option<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub destination_number: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    #[serde(default)]
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub group_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_number: Option<String>,
}

impl Quote {
    fn reference(&self) -> Option<String> {
        let author = self.author_number.as_ref().or(self.author.as_ref())?;
        Some(native_id(author, self.id))
    }
}

/// Signal has no message ids; `(author, sent timestamp)` identifies a message.
fn native_id(author: &str, timestamp: i64) -> String {
    format!("{author}:{timestamp}")
}

pub struct SignalProfile {
    data_dir: PathBuf,
    self_handle: Option<String>,
}

impl SignalProfile {
    pub fn new(data_dir: impl Into<PathBuf>, self_handle: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            self_handle,
        }
    }

    fn conversation(
        group: Option<&GroupInfo>,
        peer: &Participant,
    ) -> ThreadDescriptor {
        match group {
            Some(group) => ThreadDescriptor {
                conversation_id: group.group_id.clone(),
                title: group
                    .group_name
                    .clone()
                    .unwrap_or_else(|| "Signal group".to_string()),
                kind: ThreadKind::Group,
                participants: vec![peer.clone()],
            },
            None => ThreadDescriptor {
                conversation_id: peer.handle.clone(),
                title: peer.name.clone().unwrap_or_else(|| peer.handle.clone()),
                kind: ThreadKind::Dm,
                participants: vec![peer.clone()],
            },
        }
    }
}

impl PlatformProfile for SignalProfile {
    type Record = SignalRecord;

    fn platform(&self) -> Platform {
        Platform::Signal
    }

    /// signal-cli keeps registered accounts in `data/accounts.json`.
    fn has_credentials(&self) -> bool {
        non_empty_file(&self.data_dir.join("data").join("accounts.json"))
    }

    fn normalize(&self, record: SignalRecord) -> Result<Option<NormalizedMessage>, ChorusError> {
        let envelope = record.envelope;

        if let Some(sent) = envelope.sync_message.and_then(|s| s.sent_message) {
            let Some(content) = non_blank(sent.message.as_deref()) else {
                return Ok(None);
            };
            let own = record
                .account
                .or_else(|| self.self_handle.clone())
                .ok_or_else(|| {
                    ChorusError::Validation("sent sync message without a local account".into())
                })?;
            let timestamp = sent.timestamp.unwrap_or(envelope.timestamp);
            let destination = sent.destination_number.or(sent.destination);
            let peer = match (&sent.group_info, destination) {
                (_, Some(handle)) => Participant { handle, name: None },
                (Some(_), None) => Participant {
                    handle: own.clone(),
                    name: None,
                },
                (None, None) => {
                    return Err(ChorusError::Validation(
                        "sent sync message without destination".into(),
                    ));
                }
            };
            let mut tags = Tags::new();
            if let Some(group) = &sent.group_info {
                tags.insert(Tags::GROUP, group.group_id.clone());
            }
            return Ok(Some(NormalizedMessage {
                kind: MessageKind::SignalMessage,
                content,
                created_at: created_at(timestamp)?,
                platform_id: native_id(&own, timestamp),
                author: Participant {
                    handle: own,
                    name: None,
                },
                thread: Self::conversation(sent.group_info.as_ref(), &peer),
                reply_to: sent.quote.as_ref().and_then(Quote::reference),
                tags,
            }));
        }

        let Some(data) = envelope.data_message else {
            return Ok(None);
        };
        let Some(content) = non_blank(data.message.as_deref()) else {
            return Ok(None);
        };
        let handle = envelope
            .source_number
            .or(envelope.source)
            .ok_or_else(|| ChorusError::Validation("signal envelope without source".into()))?;
        let author = Participant {
            handle,
            name: envelope.source_name,
        };
        let timestamp = data.timestamp.unwrap_or(envelope.timestamp);
        let mut tags = Tags::new();
        if let Some(group) = &data.group_info {
            tags.insert(Tags::GROUP, group.group_id.clone());
        }
        Ok(Some(NormalizedMessage {
            kind: MessageKind::SignalMessage,
            content,
            created_at: created_at(timestamp)?,
            platform_id: native_id(&author.handle, timestamp),
            thread: Self::conversation(data.group_info.as_ref(), &author),
            reply_to: data.quote.as_ref().and_then(Quote::reference),
            author,
            tags,
        }))
    }
}

fn created_at(ms: i64) -> Result<chrono::DateTime<chrono::Utc>, ChorusError> {
    from_millis(ms).ok_or_else(|| ChorusError::Validation(format!("bad signal timestamp {ms}")))
}
