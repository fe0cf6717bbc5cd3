// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp multi-device messages.

use std::path::PathBuf;

use chorus_core::{
    ChorusError, MessageKind, NormalizedMessage, Participant, Platform, Tags, ThreadDescriptor,
    ThreadKind,
};
use serde::Deserialize;

use super::{from_secs, non_blank, non_empty_file};
use crate::adapter::PlatformProfile;

const GROUP_SUFFIX: &str = "@g.us";

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsappRecord {
    pub id: String,
    pub chat_jid: String,
    #[serde(default)]
    pub chat_name: Option<String>,
    /// Present in groups; DMs are authored by the chat peer.
    #[serde(default)]
    pub sender_jid: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quoted_id: Option<String>,
}

/// `15550100@s.whatsapp.net` (optionally with a `:device` suffix) becomes
/// `+15550100`. Anything else is returned unchanged.
pub fn jid_handle(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or(jid);
    let user = user.split(':').next().unwrap_or(user);
    if !user.is_empty() && user.chars().all(|c| c.is_ascii_digit()) && !jid.ends_with(GROUP_SUFFIX) {
        format!("+{user}")
    } else {
        jid.to_string()
    }
}

pub struct WhatsappProfile {
    session_dir: Option<PathBuf>,
    self_handle: Option<String>,
}

impl WhatsappProfile {
    pub fn new(session_dir: Option<PathBuf>, self_handle: Option<String>) -> Self {
        Self {
            session_dir,
            self_handle,
        }
    }
}

impl PlatformProfile for WhatsappProfile {
    type Record = WhatsappRecord;

    fn platform(&self) -> Platform {
        Platform::Whatsapp
    }

    fn has_credentials(&self) -> bool {
        self.session_dir
            .as_ref()
            .is_some_and(|dir| non_empty_file(&dir.join("creds.json")))
    }

    fn normalize(&self, record: WhatsappRecord) -> Result<Option<NormalizedMessage>, ChorusError> {
        let Some(content) = non_blank(record.text.as_deref()) else {
            return Ok(None);
        };
        let created_at = from_secs(record.timestamp).ok_or_else(|| {
            ChorusError::Validation(format!("bad whatsapp timestamp {}", record.timestamp))
        })?;
        let is_group = record.chat_jid.ends_with(GROUP_SUFFIX);

        let author = if record.from_me {
            let handle = self.self_handle.clone().ok_or_else(|| {
                ChorusError::Validation("own whatsapp message but no self handle configured".into())
            })?;
            Participant { handle, name: None }
        } else {
            let jid = match (&record.sender_jid, is_group) {
                (Some(sender), _) => sender.as_str(),
                (None, false) => record.chat_jid.as_str(),
                (None, true) => {
                    return Err(ChorusError::Validation(format!(
                        "group message {} without sender",
                        record.id
                    )));
                }
            };
            Participant {
                handle: jid_handle(jid),
                name: record.push_name.clone(),
            }
        };

        let peer = Participant {
            handle: jid_handle(&record.chat_jid),
            name: if is_group { None } else { record.chat_name.clone() },
        };
        let title = record
            .chat_name
            .clone()
            .unwrap_or_else(|| peer.handle.clone());

        let mut tags = Tags::new();
        if is_group {
            tags.insert(Tags::GROUP, record.chat_jid.clone());
        }

        Ok(Some(NormalizedMessage {
            kind: MessageKind::WhatsappMessage,
            content,
            created_at,
            platform_id: record.id,
            author: author.clone(),
            thread: ThreadDescriptor {
                conversation_id: record.chat_jid,
                title,
                kind: if is_group { ThreadKind::Group } else { ThreadKind::Dm },
                participants: if is_group { vec![author] } else { vec![peer] },
            },
            reply_to: record.quoted_id,
            tags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> WhatsappProfile {
        WhatsappProfile::new(None, Some("+15550199".into()))
    }

    fn parse(json: &str) -> WhatsappRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn jids_become_phone_handles() {
        assert_eq!(jid_handle("15550100@s.whatsapp.net"), "+15550100");
        assert_eq!(jid_handle("15550100:12@s.whatsapp.net"), "+15550100");
        assert_eq!(jid_handle("1203630@g.us"), "1203630@g.us");
    }

    #[test]
    fn direct_message_from_peer() {
        let record = parse(
            r#"{"id":"3EB0","chat_jid":"15550100@s.whatsapp.net","chat_name":"Bob","push_name":"Bobby","timestamp":1700000000,"text":"yo"}"#,
        );
        let msg = profile().normalize(record).unwrap().unwrap();
        assert_eq!(msg.author.handle, "+15550100");
        assert_eq!(msg.thread.kind, ThreadKind::Dm);
        assert_eq!(msg.thread.title, "Bob");
        assert_eq!(msg.platform_id, "3EB0");
    }

    #[test]
    fn own_message_is_authored_by_self() {
        let record = parse(
            r#"{"id":"3EB1","chat_jid":"1203630@g.us","chat_name":"Family","from_me":true,"timestamp":1700000000,"text":"dinner?"}"#,
        );
        let msg = profile().normalize(record).unwrap().unwrap();
        assert_eq!(msg.author.handle, "+15550199");
        assert_eq!(msg.thread.kind, ThreadKind::Group);
        assert_eq!(msg.tags.get(Tags::GROUP), Some("1203630@g.us"));

        let no_self = WhatsappProfile::new(None, None);
        let record = parse(
            r#"{"id":"3EB2","chat_jid":"1203630@g.us","from_me":true,"timestamp":1700000000,"text":"x"}"#,
        );
        assert!(no_self.normalize(record).is_err());
    }

    #[test]
    fn credentials_need_creds_json() {
        let dir = tempfile::tempdir().unwrap();
        let profile = WhatsappProfile::new(Some(dir.path().to_path_buf()), None);
        assert!(!profile.has_credentials());
        std::fs::write(dir.path().join("creds.json"), "{}").unwrap();
        assert!(profile.has_credentials());
    }
}
