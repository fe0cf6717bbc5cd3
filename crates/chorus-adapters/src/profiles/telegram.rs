// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram user-session messages.

use std::path::PathBuf;

use chorus_core::{
    ChorusError, MessageKind, NormalizedMessage, Participant, Platform, Tags, ThreadDescriptor,
    ThreadKind,
};
use serde::Deserialize;

use super::{from_secs, non_blank, non_empty_file};
use crate::adapter::PlatformProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatType {
    fn thread_kind(self) -> ThreadKind {
        match self {
            ChatType::Private => ThreadKind::Dm,
            ChatType::Group | ChatType::Supergroup => ThreadKind::Group,
            ChatType::Channel => ThreadKind::Channel,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    fn display_name(&self) -> Option<String> {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        non_blank(Some(full.as_str())).or_else(|| self.username.clone())
    }

    fn participant(&self) -> Participant {
        Participant {
            handle: self.id.to_string(),
            name: self.display_name(),
        }
    }
}

/// A message as exported by the Telegram sync client.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramRecord {
    pub message_id: i64,
    pub chat: Chat,
    /// Unix seconds.
    pub date: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
    #[serde(default)]
    pub edit_date: Option<i64>,
}

pub struct TelegramProfile {
    session_file: Option<PathBuf>,
    api_configured: bool,
}

impl TelegramProfile {
    pub fn new(session_file: Option<PathBuf>, api_configured: bool) -> Self {
        Self {
            session_file,
            api_configured,
        }
    }
}

/// Telegram message ids are only unique within a chat.
fn native_id(chat_id: i64, message_id: i64) -> String {
    format!("{chat_id}:{message_id}")
}

impl PlatformProfile for TelegramProfile {
    type Record = TelegramRecord;

    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    fn has_credentials(&self) -> bool {
        self.api_configured && self.session_file.as_deref().is_some_and(non_empty_file)
    }

    fn normalize(&self, record: TelegramRecord) -> Result<Option<NormalizedMessage>, ChorusError> {
        let Some(content) =
            non_blank(record.text.as_deref()).or_else(|| non_blank(record.caption.as_deref()))
        else {
            return Ok(None);
        };
        let created_at = from_secs(record.date).ok_or_else(|| {
            ChorusError::Validation(format!("bad telegram date {}", record.date))
        })?;

        let chat = &record.chat;
        // Channel posts carry no sender; the channel itself is the author.
        let author = match &record.from {
            Some(user) => user.participant(),
            None => Participant {
                handle: chat.id.to_string(),
                name: chat.title.clone(),
            },
        };
        let title = chat
            .title
            .clone()
            .or_else(|| chat.username.clone())
            .or_else(|| author.name.clone())
            .unwrap_or_else(|| chat.id.to_string());

        let mut tags = Tags::new();
        if let Some(edited) = record.edit_date {
            tags.insert(Tags::EDITED, edited.to_string());
        }

        Ok(Some(NormalizedMessage {
            kind: MessageKind::TelegramMessage,
            content,
            created_at,
            platform_id: native_id(chat.id, record.message_id),
            thread: ThreadDescriptor {
                conversation_id: chat.id.to_string(),
                title,
                kind: chat.kind.thread_kind(),
                participants: vec![author.clone()],
            },
            reply_to: record.reply_to_message_id.map(|id| native_id(chat.id, id)),
            author,
            tags,
        }))
    }
}
