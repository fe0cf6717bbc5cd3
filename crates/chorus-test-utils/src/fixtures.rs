// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for normalized messages.

use chorus_core::{
    MessageKind, NormalizedMessage, Participant, Platform, SyncMetadata, SyncProgress, Tags,
    ThreadDescriptor, ThreadKind, Watermark,
};
use chrono::{TimeZone, Utc};

/// A direct message from `handle` in the DM thread named after it.
pub fn dm(
    platform: Platform,
    handle: &str,
    content: &str,
    platform_id: &str,
    created_at_ms: i64,
) -> NormalizedMessage {
    NormalizedMessage {
        kind: MessageKind::for_platform(platform),
        content: content.to_string(),
        created_at: Utc
            .timestamp_millis_opt(created_at_ms)
            .single()
            .unwrap_or_else(Utc::now),
        platform_id: platform_id.to_string(),
        author: Participant {
            handle: handle.to_string(),
            name: None,
        },
        thread: ThreadDescriptor {
            conversation_id: handle.to_string(),
            title: handle.to_string(),
            kind: ThreadKind::Dm,
            participants: Vec::new(),
        },
        reply_to: None,
        tags: Tags::new(),
    }
}

/// A message from `author` into the group `conversation_id`.
pub fn group(
    platform: Platform,
    conversation_id: &str,
    author: &str,
    content: &str,
    platform_id: &str,
    created_at_ms: i64,
) -> NormalizedMessage {
    let mut message = dm(platform, author, content, platform_id, created_at_ms);
    message.thread = ThreadDescriptor {
        conversation_id: conversation_id.to_string(),
        title: conversation_id.to_string(),
        kind: ThreadKind::Group,
        participants: Vec::new(),
    };
    message
}

/// A sequence watermark for `(source, scope)` covering `count` messages.
pub fn progress(source: &str, scope: &str, sequence: i64, count: u64) -> SyncProgress {
    SyncProgress {
        source: source.to_string(),
        scope: scope.to_string(),
        watermark: Watermark::Sequence(sequence),
        metadata: SyncMetadata::new(),
        count,
    }
}
