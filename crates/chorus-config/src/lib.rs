// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Chorus sync daemon.
//!
//! TOML files merged over compiled defaults, `CHORUS_*` environment
//! overrides, strict unknown-key rejection and miette diagnostics with
//! typo suggestions.
//!
//! ```no_run
//! use chorus_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("data dir: {}", config.data_dir().display());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{ChorusConfig, RestartPolicyKind};

/// Loads the standard hierarchy and validates the result.
pub fn load_and_validate() -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads an explicit config file (plus env overrides) and validates it.
pub fn load_and_validate_path(path: &Path) -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Loads a TOML string over the defaults and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<ChorusConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ChorusConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(path: &Path) -> Option<(String, String)> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| (path.display().to_string(), content))
}

/// Source files of the standard hierarchy, for error spans.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![Path::new(loader::SYSTEM_CONFIG_PATH).to_path_buf()];
    candidates.extend(loader::user_config_path());
    candidates.push(
        std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG_FILE))
            .unwrap_or_else(|_| loader::LOCAL_CONFIG_FILE.into()),
    );
    candidates.iter().filter_map(|p| read_source(p)).collect()
}
