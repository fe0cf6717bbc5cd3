// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inputs and outputs of content store operations.

use std::collections::BTreeMap;

use chorus_core::{
    AccountId, Author, MessageId, MessageKind, MessageSource, Platform, Tags, ThreadId,
    ThreadKind, Visibility,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to find or create an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub platform: Platform,
    pub handle: String,
    pub display_name: String,
    pub is_self: bool,
}

impl AccountSpec {
    pub fn new(platform: Platform, handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            platform,
            handle: handle.into(),
            display_name: display_name.into(),
            is_self: false,
        }
    }

    pub fn self_account(mut self) -> Self {
        self.is_self = true;
        self
    }
}

/// Everything needed to find or create a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    pub platform: Platform,
    pub conversation_id: String,
    pub title: String,
    pub kind: ThreadKind,
    /// Accounts to add. Existing participants are never removed.
    pub participants: Vec<AccountId>,
}

/// A message to be stored. The id is derived, never supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub content: String,
    pub account_id: AccountId,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub thread_id: ThreadId,
    pub reply_to: Option<MessageId>,
    pub source: MessageSource,
    pub tags: Tags,
    pub visibility: Visibility,
}

/// Result of [`ContentStore::create_message`](crate::ContentStore::create_message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWrite {
    pub message: chorus_core::Message,
    /// `false` when an identical message was already stored.
    pub inserted: bool,
}

/// Indexed metadata of a stored message. The body lives in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub id: MessageId,
    pub account_id: AccountId,
    pub thread_id: ThreadId,
    pub created_at: DateTime<Utc>,
    pub imported_at: DateTime<Utc>,
    pub platform: Platform,
    pub kind: MessageKind,
    pub platform_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub accounts: u64,
    pub threads: u64,
    pub messages: u64,
    pub per_platform: BTreeMap<Platform, u64>,
}
