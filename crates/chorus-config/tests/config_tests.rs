// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Chorus configuration system.

use chorus_config::diagnostic::ConfigError;
use chorus_config::model::ChorusConfig;
use chorus_config::{
    RestartPolicyKind, load_and_validate_path, load_and_validate_str, load_config_from_path,
    load_config_from_str,
};
use chorus_core::Platform;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[daemon]
data_dir = "/var/lib/chorus"
log_level = "debug"
shutdown_timeout_secs = 5

[state]
busy_timeout_ms = 2500
health_history_limit = 50

[health]
error_threshold = 5
error_window_secs = 600

[restart]
policy = "backoff"
max_attempts = 3

[signal]
account = "+15550100"

[telegram]
api_id = 12345
api_hash = "abcdef"
session_file = "/var/lib/chorus/telegram.session"

[email]
imap_host = "imap.example.com"
username = "me@example.com"
password_file = "/run/secrets/imap"
mailboxes = ["INBOX", "Sent"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.daemon.data_dir, "/var/lib/chorus");
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.daemon.shutdown_timeout_secs, 5);
    assert_eq!(config.state.busy_timeout_ms, 2500);
    assert_eq!(config.state.health_history_limit, 50);
    assert_eq!(config.health.error_threshold, 5);
    assert_eq!(config.restart.policy, RestartPolicyKind::Backoff);
    assert_eq!(config.telegram.api_id, Some(12345));
    assert_eq!(config.email.mailboxes, vec!["INBOX", "Sent"]);
    assert_eq!(config.email.imap_port, 993);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.daemon.log_level, "info");
    assert_eq!(config.health.check_interval_secs, 60);
    assert_eq!(config.health.error_window_secs, 900);
    assert_eq!(config.health.error_threshold, 3);
    assert_eq!(config.state.health_history_limit, 100);
    assert_eq!(config.restart.policy, RestartPolicyKind::Manual);
    assert!(Platform::ALL.iter().all(|p| config.is_enabled(*p)));
}

#[test]
fn derived_paths_follow_data_dir() {
    let config = load_config_from_str(
        r#"
[daemon]
data_dir = "/srv/chorus"

[search]
database_path = "/tmp/search.db"

[discord]
spool_dir = "/tmp/discord-spool"
"#,
    )
    .unwrap();

    assert_eq!(config.store_path(), std::path::Path::new("/srv/chorus/store"));
    assert_eq!(
        config.state_database_path(),
        std::path::Path::new("/srv/chorus/state.db")
    );
    assert_eq!(
        config.search_database_path(),
        std::path::Path::new("/tmp/search.db")
    );
    assert_eq!(
        config.spool_dir(Platform::Discord),
        std::path::Path::new("/tmp/discord-spool")
    );
    assert_eq!(
        config.spool_dir(Platform::Signal),
        std::path::Path::new("/srv/chorus/spool/signal")
    );
}

#[test]
fn self_handle_falls_back_to_account_identity() {
    let config = load_config_from_str(
        r#"
[signal]
account = "+15550100"

[email]
username = "me@example.com"
self_handle = "me+alias@example.com"
"#,
    )
    .unwrap();

    assert_eq!(config.self_handle(Platform::Signal), Some("+15550100"));
    assert_eq!(
        config.self_handle(Platform::Email),
        Some("me+alias@example.com")
    );
    assert_eq!(config.self_handle(Platform::Discord), None);
}

#[test]
fn unknown_field_in_section_is_rejected() {
    let toml = r#"
[telegram]
api_hsah = "abc"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "api_hsah");
            assert_eq!(suggestion.as_deref(), Some("api_hash"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[slack]\ntoken = \"x\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "slack"))
    );
}

#[test]
fn invalid_type_is_reported() {
    let errors = load_and_validate_str("[health]\nerror_threshold = \"many\"\n").unwrap_err();
    let text = errors[0].to_string();
    assert!(text.contains("error_threshold"), "got: {text}");
}

#[test]
fn unknown_restart_policy_is_reported() {
    let errors = load_and_validate_str("[restart]\npolicy = \"sometimes\"\n").unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn validation_errors_surface_through_loader() {
    let errors = load_and_validate_str("[daemon]\nshutdown_timeout_secs = 0\n").unwrap_err();
    assert!(errors[0].to_string().contains("daemon.shutdown_timeout_secs"));
}

#[test]
fn unknown_key_diagnostic_renders_with_span() {
    use miette::GraphicalReportHandler;

    let errors = load_and_validate_str("[daemon]\nlog_levle = \"debug\"\n").unwrap_err();
    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &errors[0])
        .expect("should render");
    assert!(buf.contains("log_levle"));
    assert!(buf.contains("did you mean `log_level`"));
}

#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[daemon]
log_level = "warn"

[telegram]
api_id = 1
api_hash = "from-file"
"#,
        )?;
        jail.set_env("CHORUS_DAEMON_LOG_LEVEL", "debug");
        jail.set_env("CHORUS_TELEGRAM_API_HASH", "from-env");
        jail.set_env("CHORUS_HEALTH_ERROR_THRESHOLD", "7");

        let config = load_config_from_path(std::path::Path::new("custom.toml"))?;
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.telegram.api_hash.as_deref(), Some("from-env"));
        assert_eq!(config.health.error_threshold, 7);
        Ok(())
    });
}

#[test]
fn load_and_validate_path_reads_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "chorus.toml",
            "[discord]\ntoken_file = \"/run/secrets/discord\"\n",
        )?;
        let config: ChorusConfig =
            load_and_validate_path(&jail.directory().join("chorus.toml"))
                .map_err(|errors| format!("{errors:?}"))?;
        assert_eq!(
            config.discord.token_file.as_deref(),
            Some("/run/secrets/discord")
        );
        Ok(())
    });
}
