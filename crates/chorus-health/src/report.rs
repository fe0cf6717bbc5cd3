// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chorus_core::{ConnectionStatus, Platform};
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// Result of one platform check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformHealth {
    pub platform: Platform,
    pub healthy: bool,
    pub status: ConnectionStatus,
    pub issues: Vec<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Checks inside the error window that found the platform not
    /// connected, not counting this one.
    pub recent_failures: u32,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallHealth {
    /// All pass (vacuously so for no platforms) is healthy, none pass is
    /// unhealthy, anything in between is degraded.
    pub fn classify(platforms: &[PlatformHealth]) -> Self {
        let passing = platforms.iter().filter(|p| p.healthy).count();
        if passing == platforms.len() {
            OverallHealth::Healthy
        } else if passing == 0 {
            OverallHealth::Unhealthy
        } else {
            OverallHealth::Degraded
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: OverallHealth,
    pub platforms: Vec<PlatformHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn platform(&self, platform: Platform) -> Option<&PlatformHealth> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

/// Per-check outcome broadcast to subscribers.
///
/// `Recovered` replaces `Healthy` on the first passing check after a
/// failing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    Healthy { platform: Platform },
    Unhealthy { platform: Platform, issues: Vec<String> },
    Recovered { platform: Platform },
}

impl HealthEvent {
    pub fn platform(&self) -> Platform {
        match self {
            HealthEvent::Healthy { platform }
            | HealthEvent::Unhealthy { platform, .. }
            | HealthEvent::Recovered { platform } => *platform,
        }
    }
}
