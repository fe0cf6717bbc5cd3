// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email fetched over IMAP.
//!
//! Threads are keyed by the root of the `References` chain so a whole
//! conversation lands in one thread even when replies arrive out of order.

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
pub struct EmailAddress {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl EmailAddress {
    fn participant(&self) -> Participant {
        Participant {
            handle: self.address.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRecord {
    /// The `Message-ID` header.
    pub message_id: String,
    #[serde(default)]
    pub mailbox: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub from: EmailAddress,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
}

/// Strips surrounding whitespace and angle brackets from a message id.
pub fn clean_message_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

/// Removes any run of leading `Re:` / `Fwd:` / `Fw:` prefixes.
pub fn base_subject(subject: &str) -> &str {
    let mut rest = subject.trim();
    loop {
        let lower = rest.to_ascii_lowercase();
        let Some(prefix) = ["re:", "fwd:", "fw:"]
            .into_iter()
            .find(|p| lower.starts_with(p))
        else {
            return rest;
        };
        rest = rest[prefix.len()..].trim_start();
    }
}

pub struct EmailProfile {
    username: Option<String>,
    has_password: bool,
    password_file: Option<PathBuf>,
}

impl EmailProfile {
    pub fn new(username: Option<String>, has_password: bool, password_file: Option<PathBuf>) -> Self {
        Self {
            username,
            has_password,
            password_file,
        }
    }
}

impl PlatformProfile for EmailProfile {
    type Record = EmailRecord;

    fn platform(&self) -> Platform {
        Platform::Email
    }

    fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && (self.has_password || self.password_file.as_deref().is_some_and(non_empty_file))
    }

    fn normalize(&self, record: EmailRecord) -> Result<Option<NormalizedMessage>, ChorusError> {
        let subject = non_blank(record.subject.as_deref());
        let body = record.body.trim();
        let content = match (&subject, body.is_empty()) {
            (None, true) => return Ok(None),
            (None, false) => body.to_string(),
            (Some(subject), true) => subject.clone(),
            (Some(subject), false) => format!("{subject}\n\n{body}"),
        };

        let message_id = clean_message_id(&record.message_id);
        if message_id.is_empty() {
            return Err(ChorusError::Validation("email without Message-ID".into()));
        }
        let in_reply_to = record
            .in_reply_to
            .as_deref()
            .map(clean_message_id)
            .filter(|id| !id.is_empty());
        let root = record
            .references
            .first()
            .map(|r| clean_message_id(r))
            .filter(|id| !id.is_empty())
            .or_else(|| in_reply_to.clone())
            .unwrap_or_else(|| message_id.clone());

        let author = record.from.participant();
        let mut participants = vec![author.clone()];
        participants.extend(record.to.iter().chain(&record.cc).map(EmailAddress::participant));
        let kind = if participants.len() > 2 {
            ThreadKind::Group
        } else {
            ThreadKind::Dm
        };

        let mut tags = Tags::new();
        if let Some(mailbox) = &record.mailbox {
            tags.insert(Tags::MAILBOX, mailbox.clone());
        }
        if let Some(subject) = &subject {
            tags.insert(Tags::SUBJECT, subject.clone());
        }

        Ok(Some(NormalizedMessage {
            kind: MessageKind::Email,
            content,
            created_at: record.date,
            platform_id: message_id,
            author,
            thread: ThreadDescriptor {
                conversation_id: root,
                title: subject
                    .as_deref()
                    .map(base_subject)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("(no subject)")
                    .to_string(),
                kind,
                participants,
            },
            reply_to: in_reply_to,
            tags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EmailRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn subject_prefixes_are_stripped() {
        assert_eq!(base_subject("Re: Fwd: RE:  Plans"), "Plans");
        assert_eq!(base_subject("Plans"), "Plans");
        assert_eq!(base_subject("Re:"), "");
    }

    #[test]
    fn replies_thread_under_the_root() {
        let record = parse(
            r#"{"message_id":"<c@x>","mailbox":"INBOX","in_reply_to":"<b@x>","references":["<a@x>","<b@x>"],
                "from":{"address":"dana@example.com","name":"Dana"},"to":[{"address":"me@example.com"}],
                "subject":"Re: Plans","date":"2026-03-01T10:00:00Z","body":"Sounds good.\n"}"#,
        );
        let msg = EmailProfile::new(None, false, None).normalize(record).unwrap().unwrap();
        assert_eq!(msg.thread.conversation_id, "a@x");
        assert_eq!(msg.thread.title, "Plans");
        assert_eq!(msg.thread.kind, ThreadKind::Dm);
        assert_eq!(msg.platform_id, "c@x");
        assert_eq!(msg.reply_to.as_deref(), Some("b@x"));
        assert_eq!(msg.content, "Re: Plans\n\nSounds good.");
        assert_eq!(msg.tags.get(Tags::MAILBOX), Some("INBOX"));
        assert_eq!(msg.tags.get(Tags::SUBJECT), Some("Re: Plans"));
    }

    #[test]
    fn first_message_is_its_own_root() {
        let record = parse(
            r#"{"message_id":"<a@x>","from":{"address":"dana@example.com"},
                "to":[{"address":"me@example.com"},{"address":"eve@example.com"}],
                "date":"2026-03-01T10:00:00Z","body":"no subject here"}"#,
        );
        let msg = EmailProfile::new(None, false, None).normalize(record).unwrap().unwrap();
        assert_eq!(msg.thread.conversation_id, "a@x");
        assert_eq!(msg.thread.title, "(no subject)");
        assert_eq!(msg.thread.kind, ThreadKind::Group);
    }

    #[test]
    fn empty_messages_are_skipped() {
        let record = parse(
            r#"{"message_id":"<z@x>","from":{"address":"a@b"},"date":"2026-03-01T10:00:00Z"}"#,
        );
        assert!(EmailProfile::new(None, false, None).normalize(record).unwrap().is_none());
    }

    #[test]
    fn credentials_need_username_and_secret() {
        assert!(EmailProfile::new(Some("me".into()), true, None).has_credentials());
        assert!(!EmailProfile::new(Some("me".into()), false, None).has_credentials());
        assert!(!EmailProfile::new(None, true, None).has_credentials());
    }
}
