// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic id derivation.
//!
//! Every id is a SHA-256 digest over length-prefixed fields, so two fields
//! can never run into each other (`("ab", "c")` and `("a", "bc")` differ).

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

use crate::types::{AccountId, MessageId, MessageKind, Platform, ThreadId};

const SHORT_ID_HEX: usize = 24;

fn digest(fields: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    hex::encode(hasher.finalize())
}

/// Content-derived message id.
///
/// Pure function of its arguments. `created_at` is truncated to
/// millisecond precision before hashing.
pub fn message_id(
    kind: MessageKind,
    content: &str,
    created_at: DateTime<Utc>,
    platform: Platform,
    platform_id: &str,
) -> MessageId {
    let millis = created_at.timestamp_millis().to_string();
    let hex = digest(&[
        b"message",
        kind.as_str().as_bytes(),
        content.as_bytes(),
        millis.as_bytes(),
        platform.as_str().as_bytes(),
        platform_id.as_bytes(),
    ]);
    MessageId(format!("msg_{hex}"))
}

/// Stable account id for a platform handle. The handle is normalized first.
pub fn account_id(platform: Platform, handle: &str) -> AccountId {
    let handle = normalize_handle(handle);
    let hex = digest(&[b"account", platform.as_str().as_bytes(), handle.as_bytes()]);
    AccountId(format!("acc_{}", &hex[..SHORT_ID_HEX]))
}

/// Stable thread id for a platform-native conversation id.
pub fn thread_id(platform: Platform, conversation_id: &str) -> ThreadId {
    let hex = digest(&[
        b"thread",
        platform.as_str().as_bytes(),
        conversation_id.as_bytes(),
    ]);
    ThreadId(format!("thr_{}", &hex[..SHORT_ID_HEX]))
}

/// Trims and lowercases a handle. Phone numbers lose their formatting
/// characters, so `+1 (555) 010-2000` and `+15550102000` are one handle.
pub fn normalize_handle(handle: &str) -> String {
    let trimmed = handle.trim();
    if looks_like_phone(trimmed) {
        trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect()
    } else {
        trimmed.to_lowercase()
    }
}

fn looks_like_phone(s: &str) -> bool {
    let body = s.strip_prefix('+').unwrap_or(s);
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return false,
        }
    }
    digits >= 5
}

/// Drops sub-millisecond precision, matching what the id hashes.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}
