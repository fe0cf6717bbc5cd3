// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/chorus/chorus.toml`
//! 3. `~/.config/chorus/chorus.toml`
//! 4. `./chorus.toml`
//! 5. `CHORUS_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChorusConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/chorus/chorus.toml";
pub const LOCAL_CONFIG_FILE: &str = "chorus.toml";

/// Top-level sections, used to map `CHORUS_<SECTION>_<KEY>` env vars.
pub const SECTIONS: &[&str] = &[
    "daemon", "store", "state", "search", "health", "restart", "signal", "telegram", "whatsapp",
    "discord", "email",
];

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ChorusConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<ChorusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChorusConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChorusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChorusConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The standard Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChorusConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/chorus/chorus.toml`, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chorus").join(LOCAL_CONFIG_FILE))
}

/// `CHORUS_TELEGRAM_API_HASH` maps to `telegram.api_hash`, not
/// `telegram.api.hash`: only the section separator becomes a dot.
fn env_provider() -> Env {
    Env::prefixed("CHORUS_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to a dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(map_env_key("telegram_api_hash"), "telegram.api_hash");
        assert_eq!(
            map_env_key("daemon_shutdown_timeout_secs"),
            "daemon.shutdown_timeout_secs"
        );
        assert_eq!(map_env_key("state_busy_timeout_ms"), "state.busy_timeout_ms");
        assert_eq!(map_env_key("store_path"), "store.path");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("bogus_key"), "bogus_key");
    }
}
