// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-platform record types, credential probes and normalization.

pub mod discord;
pub mod email;
pub mod signal;
pub mod telegram;
pub mod whatsapp;

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};

pub use discord::{DiscordProfile, DiscordRecord};
pub use email::{EmailProfile, EmailRecord};
pub use signal::{SignalProfile, SignalRecord};
pub use telegram::{TelegramProfile, TelegramRecord};
pub use whatsapp::{WhatsappProfile, WhatsappRecord};

/// True when `path` is an existing, non-empty regular file.
pub(crate) fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub(crate) fn from_secs(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Trimmed text, or `None` when blank.
pub(crate) fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
