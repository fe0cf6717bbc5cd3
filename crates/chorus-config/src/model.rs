// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chorus sync daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a typo in a config
//! file is reported at startup instead of being silently ignored.

use std::path::PathBuf;
use std::time::Duration;

use chorus_core::Platform;
use serde::{Deserialize, Serialize};

/// Top-level Chorus configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChorusConfig {
    /// Process-wide daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Content store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// State database settings.
    #[serde(default)]
    pub state: StateConfig,

    /// Full-text search index settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Health monitor thresholds.
    #[serde(default)]
    pub health: HealthConfig,

    /// What to do when a platform turns unhealthy.
    #[serde(default)]
    pub restart: RestartConfig,

    #[serde(default)]
    pub signal: SignalConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

impl ChorusConfig {
    /// Root data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.daemon.data_dir)
    }

    /// Content store root; defaults to `<data_dir>/store`.
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(p) => expand_home(p),
            None => self.data_dir().join("store"),
        }
    }

    /// State database file; defaults to `<data_dir>/state.db`.
    pub fn state_database_path(&self) -> PathBuf {
        match &self.state.database_path {
            Some(p) => expand_home(p),
            None => self.data_dir().join("state.db"),
        }
    }

    /// Search index file; defaults to `<data_dir>/search.db`.
    pub fn search_database_path(&self) -> PathBuf {
        match &self.search.database_path {
            Some(p) => expand_home(p),
            None => self.data_dir().join("search.db"),
        }
    }

    /// Spool directory external sync clients write into for `platform`.
    /// Defaults to `<data_dir>/spool/<platform>`.
    pub fn spool_dir(&self, platform: Platform) -> PathBuf {
        let configured = match platform {
            Platform::Signal => &self.signal.spool_dir,
            Platform::Telegram => &self.telegram.spool_dir,
            Platform::Whatsapp => &self.whatsapp.spool_dir,
            Platform::Discord => &self.discord.spool_dir,
            Platform::Email => &self.email.spool_dir,
        };
        match configured {
            Some(p) => expand_home(p),
            None => self.data_dir().join("spool").join(platform.as_str()),
        }
    }

    /// Whether the platform section is enabled.
    pub fn is_enabled(&self, platform: Platform) -> bool {
        match platform {
            Platform::Signal => self.signal.enabled,
            Platform::Telegram => self.telegram.enabled,
            Platform::Whatsapp => self.whatsapp.enabled,
            Platform::Discord => self.discord.enabled,
            Platform::Email => self.email.enabled,
        }
    }

    /// The handle that identifies the local user on `platform`, if known.
    pub fn self_handle(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Signal => self
                .signal
                .self_handle
                .as_deref()
                .or(self.signal.account.as_deref()),
            Platform::Telegram => self.telegram.self_handle.as_deref(),
            Platform::Whatsapp => self.whatsapp.self_handle.as_deref(),
            Platform::Discord => self.discord.self_handle.as_deref(),
            Platform::Email => self
                .email
                .self_handle
                .as_deref()
                .or(self.email.username.as_deref()),
        }
    }

    pub fn poll_interval(&self, platform: Platform) -> Duration {
        let secs = match platform {
            Platform::Signal => self.signal.poll_interval_secs,
            Platform::Telegram => self.telegram.poll_interval_secs,
            Platform::Whatsapp => self.whatsapp.poll_interval_secs,
            Platform::Discord => self.discord.poll_interval_secs,
            Platform::Email => self.email.poll_interval_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Expands a leading `~/` using the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Process-wide daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Root directory for the store, databases and spools.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on a graceful stop before it is recorded as unclean.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// How often live adapter stats are flushed to the state database.
    #[serde(default = "default_state_flush_interval_secs")]
    pub state_flush_interval_secs: u64,

    /// Attempts made to store one message before the batch is marked failed.
    #[serde(default = "default_ingest_retries")]
    pub ingest_retries: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            state_flush_interval_secs: default_state_flush_interval_secs(),
            ingest_retries: default_ingest_retries(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("chorus").display().to_string())
        .unwrap_or_else(|| "chorus-data".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_state_flush_interval_secs() -> u64 {
    30
}

fn default_ingest_retries() -> u32 {
    3
}

/// Content store configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store root. `None` uses `<data_dir>/store`.
    #[serde(default)]
    pub path: Option<String>,
}

/// State database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Database file. `None` uses `<data_dir>/state.db`.
    #[serde(default)]
    pub database_path: Option<String>,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Health check rows retained per platform.
    #[serde(default = "default_health_history_limit")]
    pub health_history_limit: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            health_history_limit: default_health_history_limit(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_health_history_limit() -> u32 {
    100
}

/// Search index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Database file. `None` uses `<data_dir>/search.db`.
    #[serde(default)]
    pub database_path: Option<String>,

    /// Result limit used when a query does not give one.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_limit: default_search_limit(),
        }
    }
}

fn default_search_limit() -> usize {
    20
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Silence longer than this is reported as an issue, never as a failure.
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Window in which failed connection checks are counted.
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,

    /// Failed checks within the window that make a platform unhealthy.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            stale_threshold_secs: default_stale_threshold_secs(),
            error_window_secs: default_error_window_secs(),
            error_threshold: default_error_threshold(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_stale_threshold_secs() -> u64 {
    6 * 3600
}

fn default_error_window_secs() -> u64 {
    900
}

fn default_error_threshold() -> u32 {
    3
}

/// Restart policy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicyKind {
    /// Log and wait for an operator.
    #[default]
    Manual,
    /// Restart with exponential backoff, up to `max_attempts`.
    Backoff,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RestartConfig {
    #[serde(default)]
    pub policy: RestartPolicyKind,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            policy: RestartPolicyKind::default(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// Signal (signal-cli) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// signal-cli data directory. `None` uses `~/.local/share/signal-cli`.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Registered account number, e.g. `+15550100`.
    #[serde(default)]
    pub account: Option<String>,

    /// Overrides `account` as the self handle.
    #[serde(default)]
    pub self_handle: Option<String>,

    #[serde(default)]
    pub spool_dir: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: None,
            account: None,
            self_handle: None,
            spool_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SignalConfig {
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(p) => expand_home(p),
            None => dirs::data_local_dir()
                .map(|d| d.join("signal-cli"))
                .unwrap_or_else(|| PathBuf::from("signal-cli")),
        }
    }
}

/// Telegram (user session) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub api_id: Option<i64>,

    #[serde(default)]
    pub api_hash: Option<String>,

    /// Session file produced by the external login flow.
    #[serde(default)]
    pub session_file: Option<String>,

    #[serde(default)]
    pub self_handle: Option<String>,

    #[serde(default)]
    pub spool_dir: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_id: None,
            api_hash: None,
            session_file: None,
            self_handle: None,
            spool_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// WhatsApp (multi-device web session) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding the paired session (`creds.json`).
    #[serde(default)]
    pub session_dir: Option<String>,

    #[serde(default)]
    pub self_handle: Option<String>,

    #[serde(default)]
    pub spool_dir: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_dir: None,
            self_handle: None,
            spool_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Discord configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Inline token. Prefer `token_file`.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub token_file: Option<String>,

    #[serde(default)]
    pub self_handle: Option<String>,

    #[serde(default)]
    pub spool_dir: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            token_file: None,
            self_handle: None,
            spool_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Email (IMAP) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub imap_host: Option<String>,

    #[serde(default = "default_imap_port")]
    pub imap_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub password_file: Option<String>,

    /// Mailboxes to sync, each its own sync scope.
    #[serde(default = "default_mailboxes")]
    pub mailboxes: Vec<String>,

    /// Overrides `username` as the self handle.
    #[serde(default)]
    pub self_handle: Option<String>,

    #[serde(default)]
    pub spool_dir: Option<String>,

    #[serde(default = "default_email_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            imap_host: None,
            imap_port: default_imap_port(),
            username: None,
            password: None,
            password_file: None,
            mailboxes: default_mailboxes(),
            self_handle: None,
            spool_dir: None,
            poll_interval_secs: default_email_poll_interval_secs(),
        }
    }
}

fn default_imap_port() -> u16 {
    993
}

fn default_mailboxes() -> Vec<String> {
    vec!["INBOX".to_string()]
}

fn default_email_poll_interval_secs() -> u64 {
    300
}
