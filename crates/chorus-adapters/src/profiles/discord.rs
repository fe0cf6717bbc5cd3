// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord guild channels and direct messages.

use std::path::PathBuf;

use chorus_core::{
    ChorusError, MessageKind, NormalizedMessage, Participant, Platform, Tags, ThreadDescriptor,
    ThreadKind,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{non_blank, non_empty_file};
use crate::adapter::PlatformProfile;

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAuthor {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordRecord {
    pub id: String,
    pub channel_id: String,
    /// Absent for DMs and group DMs.
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub author: DiscordAuthor,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referenced_message_id: Option<String>,
}

pub struct DiscordProfile {
    token: Option<String>,
    token_file: Option<PathBuf>,
}

impl DiscordProfile {
    pub fn new(token: Option<String>, token_file: Option<PathBuf>) -> Self {
        Self { token, token_file }
    }
}

impl PlatformProfile for DiscordProfile {
    type Record = DiscordRecord;

    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn has_credentials(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.token_file.as_deref().is_some_and(non_empty_file)
    }

    fn normalize(&self, record: DiscordRecord) -> Result<Option<NormalizedMessage>, ChorusError> {
        let Some(content) = non_blank(Some(record.content.as_str())) else {
            return Ok(None);
        };
        let author = Participant {
            handle: record.author.username.clone(),
            name: record.author.global_name.clone(),
        };

        let (kind, title) = match &record.guild_id {
            Some(_) => (
                ThreadKind::Channel,
                format!(
                    "#{}",
                    record.channel_name.as_deref().unwrap_or(&record.channel_id)
                ),
            ),
            None => (
                ThreadKind::Dm,
                record
                    .channel_name
                    .clone()
                    .or_else(|| author.name.clone())
                    .unwrap_or_else(|| author.handle.clone()),
            ),
        };

        let mut tags = Tags::new();
        if let Some(guild) = &record.guild_id {
            tags.insert(Tags::GROUP, guild.clone());
        }
        if let Some(edited) = record.edited_timestamp {
            tags.insert(Tags::EDITED, edited.to_rfc3339());
        }

        Ok(Some(NormalizedMessage {
            kind: MessageKind::DiscordMessage,
            content,
            created_at: record.timestamp,
            platform_id: record.id,
            thread: ThreadDescriptor {
                conversation_id: record.channel_id,
                title,
                kind,
                participants: vec![author.clone()],
            },
            author,
            reply_to: record.referenced_message_id,
            tags,
        }))
    }
}
