// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chorus sync daemon.

use thiserror::Error;

use crate::types::Platform;

/// The primary error type used across the store, state manager, adapters and orchestrator.
///
/// Duplicate ingestion is deliberately absent: re-ingesting a message is an
/// expected outcome, not a failure.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// Configuration errors (invalid TOML, missing credentials paths, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed account, thread or message input. Nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage I/O or database failure. Writes are safe to retry.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error reported by a platform adapter (auth expiry, connection drop, bad payload).
    #[error("{platform} error: {message}")]
    Platform {
        platform: Platform,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No adapter or no credentials are available for the platform.
    #[error("{platform} is not configured")]
    NotConfigured { platform: Platform },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    /// Wraps any error as a storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Builds a platform error without an underlying source.
    pub fn platform(platform: Platform, message: impl Into<String>) -> Self {
        Self::Platform {
            platform,
            message: message.into(),
            source: None,
        }
    }

    /// Whether a caller may retry the failed operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for ChorusError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e)
    }
}

impl From<serde_json::Error> for ChorusError {
    fn from(e: serde_json::Error) -> Self {
        Self::storage(e)
    }
}
