// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chorus message sync daemon.
//!
//! Holds the domain types, the error taxonomy, content-addressed id
//! derivation and the [`PlatformAdapter`] trait shared by every crate in
//! the workspace.

pub mod error;
pub mod event;
pub mod ids;
pub mod traits;
pub mod types;

pub use error::ChorusError;
pub use event::{
    AdapterEvent, AdapterStats, EventHub, NormalizedMessage, Participant, SyncProgress,
    ThreadDescriptor,
};
pub use traits::{AdapterMap, PlatformAdapter};
pub use types::{
    Account, AccountId, AccountStats, Author, ConnectionStatus, Direction, HealthCheckRecord,
    Identity, Message, MessageId, MessageKind, MessageRefs, MessageSource, Platform,
    PlatformState, Resume, SyncMetadata, SyncState, Tags, Thread, ThreadId, ThreadKind,
    ThreadSource, ThreadStats, Visibility, Watermark,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chorus_error_has_all_variants() {
        let _config = ChorusError::Config("test".into());
        let _validation = ChorusError::Validation("test".into());
        let _storage = ChorusError::storage(std::io::Error::other("test"));
        let _platform = ChorusError::platform(Platform::Signal, "test");
        let _not_configured = ChorusError::NotConfigured {
            platform: Platform::Email,
        };
        let _timeout = ChorusError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ChorusError::Internal("test".into());
    }

    #[test]
    fn platform_error_display_names_platform() {
        let err = ChorusError::platform(Platform::Telegram, "session revoked");
        assert_eq!(err.to_string(), "telegram error: session revoked");
    }

    #[test]
    fn only_storage_and_timeout_are_transient() {
        assert!(ChorusError::storage(std::io::Error::other("disk")).is_transient());
        assert!(ChorusError::Timeout {
            duration: std::time::Duration::from_secs(1)
        }
        .is_transient());
        assert!(!ChorusError::Validation("empty".into()).is_transient());
        assert!(!ChorusError::Internal("bug".into()).is_transient());
    }

    #[test]
    fn io_errors_become_storage_errors() {
        let err: ChorusError = std::io::Error::other("disk full").into();
        assert!(matches!(err, ChorusError::Storage { .. }));
    }
}
