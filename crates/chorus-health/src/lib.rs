// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health monitoring for platform adapters.
//!
//! Each check looks at live adapter status (falling back to persisted
//! platform state), reports silence as an issue without failing the
//! platform, and fails it when too many recent checks found it
//! disconnected.
//! Every check is recorded in the state database and transitions are
//! broadcast as [`HealthEvent`]s.

pub mod monitor;
pub mod report;

pub use monitor::{HealthMonitor, HealthPolicy, LiveStatus};
pub use report::{HealthEvent, HealthReport, OverallHealth, PlatformHealth};
