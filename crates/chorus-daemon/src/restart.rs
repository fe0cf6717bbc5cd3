// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What to do when a platform turns unhealthy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_config::RestartPolicyKind;
use chorus_config::model::RestartConfig;
use chorus_core::Platform;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Stop and start the adapter after waiting `after`.
    Restart { after: Duration },
    /// Leave the adapter alone.
    Wait,
}

/// Injectable reaction to health events.
pub trait RestartPolicy: Send + Sync {
    fn on_unhealthy(&self, platform: Platform, issues: &[String]) -> RestartDecision;

    fn on_recovered(&self, _platform: Platform) {}
}

/// Never restarts; an operator has to look.
#[derive(Debug, Default)]
pub struct ManualIntervention;

impl RestartPolicy for ManualIntervention {
    fn on_unhealthy(&self, platform: Platform, issues: &[String]) -> RestartDecision {
        warn!(platform = %platform, issues = ?issues, "platform unhealthy, manual intervention required");
        RestartDecision::Wait
    }
}

/// Restarts with exponentially growing delays, giving up after
/// `max_attempts` until the platform recovers.
#[derive(Debug)]
pub struct BackoffRestart {
    max_attempts: u32,
    base_delay: Duration,
    attempts: Mutex<HashMap<Platform, u32>>,
}

impl BackoffRestart {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts(&self, platform: Platform) -> u32 {
        self.lock().get(&platform).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Platform, u32>> {
        self.attempts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RestartPolicy for BackoffRestart {
    fn on_unhealthy(&self, platform: Platform, issues: &[String]) -> RestartDecision {
        let mut attempts = self.lock();
        let made = attempts.entry(platform).or_insert(0);
        if *made >= self.max_attempts {
            if *made == self.max_attempts {
                error!(
                    platform = %platform,
                    attempts = *made,
                    issues = ?issues,
                    "restart attempts exhausted, manual intervention required"
                );
                *made += 1;
            }
            return RestartDecision::Wait;
        }
        let after = self
            .base_delay
            .saturating_mul(2u32.saturating_pow((*made).min(16)));
        *made += 1;
        info!(platform = %platform, attempt = *made, delay_secs = after.as_secs(), "scheduling restart");
        RestartDecision::Restart { after }
    }

    fn on_recovered(&self, platform: Platform) {
        self.lock().remove(&platform);
    }
}

/// Builds the configured policy.
pub fn from_config(config: &RestartConfig) -> Arc<dyn RestartPolicy> {
    match config.policy {
        RestartPolicyKind::Manual => Arc::new(ManualIntervention),
        RestartPolicyKind::Backoff => Arc::new(BackoffRestart::new(
            config.max_attempts,
            Duration::from_secs(config.base_delay_secs),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_never_restarts() {
        assert_eq!(
            ManualIntervention.on_unhealthy(Platform::Signal, &[]),
            RestartDecision::Wait
        );
    }

    #[test]
    fn backoff_doubles_then_gives_up() {
        let policy = BackoffRestart::new(3, Duration::from_secs(10));
        let delays: Vec<_> = (0..5)
            .map(|_| policy.on_unhealthy(Platform::Email, &[]))
            .collect();
        assert_eq!(
            delays,
            vec![
                RestartDecision::Restart { after: Duration::from_secs(10) },
                RestartDecision::Restart { after: Duration::from_secs(20) },
                RestartDecision::Restart { after: Duration::from_secs(40) },
                RestartDecision::Wait,
                RestartDecision::Wait,
            ]
        );
        // Other platforms have their own budget.
        assert!(matches!(
            policy.on_unhealthy(Platform::Signal, &[]),
            RestartDecision::Restart { .. }
        ));
    }

    #[test]
    fn recovery_resets_attempts() {
        let policy = BackoffRestart::new(1, Duration::from_secs(1));
        policy.on_unhealthy(Platform::Discord, &[]);
        assert_eq!(policy.on_unhealthy(Platform::Discord, &[]), RestartDecision::Wait);
        policy.on_recovered(Platform::Discord);
        assert_eq!(policy.attempts(Platform::Discord), 0);
        assert!(matches!(
            policy.on_unhealthy(Platform::Discord, &[]),
            RestartDecision::Restart { .. }
        ));
    }

    #[test]
    fn policy_follows_config() {
        let manual = from_config(&RestartConfig::default());
        assert_eq!(manual.on_unhealthy(Platform::Signal, &[]), RestartDecision::Wait);

        let backoff = from_config(&RestartConfig {
            policy: RestartPolicyKind::Backoff,
            max_attempts: 2,
            base_delay_secs: 5,
        });
        assert_eq!(
            backoff.on_unhealthy(Platform::Signal, &[]),
            RestartDecision::Restart { after: Duration::from_secs(5) }
        );
    }
}
