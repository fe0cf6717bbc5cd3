// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Chorus platform manager.
//!
//! [`PlatformManager`] owns the adapters it is given, starts the ones with
//! credentials, pumps their events into the content store, search index
//! and state database, reacts to health signals through a
//! [`RestartPolicy`], and shuts everything down within a deadline.

pub mod ingest;
pub mod manager;
mod pump;
pub mod restart;
pub mod shutdown;
pub mod stats;

pub use ingest::{IngestOutcome, Ingestor};
pub use manager::{ManagerOptions, PlatformManager, StartReport, StopReport, ThreadView};
pub use restart::{BackoffRestart, ManualIntervention, RestartDecision, RestartPolicy};
pub use shutdown::install_signal_handler;
pub use stats::{DaemonStats, PlatformStats};
