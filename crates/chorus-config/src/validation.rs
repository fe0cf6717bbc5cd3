// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::{ChorusConfig, RestartPolicyKind};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration, collecting every problem
/// instead of stopping at the first.
pub fn validate_config(config: &ChorusConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.daemon.data_dir.trim().is_empty() {
        errors.push(ConfigError::invalid("daemon.data_dir", "must not be empty"));
    }

    if !LOG_LEVELS.contains(&config.daemon.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "daemon.log_level",
            format!(
                "`{}` is not one of {}",
                config.daemon.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    positive(&mut errors, "daemon.shutdown_timeout_secs", config.daemon.shutdown_timeout_secs);
    positive(
        &mut errors,
        "daemon.state_flush_interval_secs",
        config.daemon.state_flush_interval_secs,
    );
    positive(&mut errors, "daemon.ingest_retries", config.daemon.ingest_retries.into());
    positive(&mut errors, "state.busy_timeout_ms", config.state.busy_timeout_ms);
    positive(
        &mut errors,
        "state.health_history_limit",
        config.state.health_history_limit.into(),
    );
    positive(&mut errors, "search.default_limit", config.search.default_limit as u64);
    positive(&mut errors, "health.check_interval_secs", config.health.check_interval_secs);
    positive(&mut errors, "health.stale_threshold_secs", config.health.stale_threshold_secs);
    positive(&mut errors, "health.error_window_secs", config.health.error_window_secs);
    positive(&mut errors, "health.error_threshold", config.health.error_threshold.into());

    if config.restart.policy == RestartPolicyKind::Backoff {
        positive(&mut errors, "restart.max_attempts", config.restart.max_attempts.into());
        positive(&mut errors, "restart.base_delay_secs", config.restart.base_delay_secs);
    }

    positive(&mut errors, "signal.poll_interval_secs", config.signal.poll_interval_secs);
    positive(&mut errors, "telegram.poll_interval_secs", config.telegram.poll_interval_secs);
    positive(&mut errors, "whatsapp.poll_interval_secs", config.whatsapp.poll_interval_secs);
    positive(&mut errors, "discord.poll_interval_secs", config.discord.poll_interval_secs);
    positive(&mut errors, "email.poll_interval_secs", config.email.poll_interval_secs);

    if config.telegram.api_id.is_some() != config.telegram.api_hash.is_some() {
        errors.push(ConfigError::invalid(
            "telegram.api_hash",
            "api_id and api_hash must be set together",
        ));
    }

    if config.discord.token.is_some() && config.discord.token_file.is_some() {
        errors.push(ConfigError::invalid(
            "discord.token",
            "set either token or token_file, not both",
        ));
    }

    if config.email.password.is_some() && config.email.password_file.is_some() {
        errors.push(ConfigError::invalid(
            "email.password",
            "set either password or password_file, not both",
        ));
    }

    if config.email.imap_port == 0 {
        errors.push(ConfigError::invalid("email.imap_port", "must be non-zero"));
    }

    if config.email.mailboxes.iter().any(|m| m.trim().is_empty()) {
        errors.push(ConfigError::invalid(
            "email.mailboxes",
            "mailbox names must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn positive(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::invalid(key, "must be greater than zero"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ChorusConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ChorusConfig::default();
        config.daemon.log_level = "loud".into();
        config.health.error_threshold = 0;
        config.telegram.api_id = Some(12345);

        let errors = validate_config(&config).unwrap_err();
        let text = messages(&errors);
        assert_eq!(errors.len(), 3, "{text:?}");
        assert!(text.iter().any(|m| m.contains("daemon.log_level")));
        assert!(text.iter().any(|m| m.contains("health.error_threshold")));
        assert!(text.iter().any(|m| m.contains("telegram.api_hash")));
    }

    #[test]
    fn backoff_limits_only_checked_for_backoff_policy() {
        let mut config = ChorusConfig::default();
        config.restart.max_attempts = 0;
        assert!(validate_config(&config).is_ok());

        config.restart.policy = RestartPolicyKind::Backoff;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("restart.max_attempts"));
    }

    #[test]
    fn conflicting_secret_sources_rejected() {
        let mut config = ChorusConfig::default();
        config.email.password = Some("hunter2".into());
        config.email.password_file = Some("/run/secrets/imap".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("email.password"));
    }
}
