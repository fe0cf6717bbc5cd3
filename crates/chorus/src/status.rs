// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chorus status` command implementation.
//!
//! Reads the persisted platform states, latest health checks and store
//! totals. Works whether or not a daemon is running.

use std::io::IsTerminal;

use chorus_adapters::build_adapters;
use chorus_config::ChorusConfig;
use chorus_core::{ChorusError, ConnectionStatus, HealthCheckRecord, Platform};
use chorus_store::StoreStats;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::query::open_offline;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// `false` while a daemon is running or after a crash.
    pub last_shutdown_clean: bool,
    pub store: StoreStats,
    pub indexed: u64,
    pub platforms: Vec<PlatformStatus>,
}

#[derive(Debug, Serialize)]
pub struct PlatformStatus {
    pub platform: Platform,
    pub enabled: bool,
    pub credentials: bool,
    pub status: Option<ConnectionStatus>,
    pub message_count: u64,
    pub error_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_health: Option<HealthCheckRecord>,
}

/// Run the `chorus status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &ChorusConfig, json: bool, plain: bool) -> Result<(), ChorusError> {
    let manager = open_offline(config, build_adapters(config)).await?;
    let authenticated = manager.discover_authenticated_platforms().await;
    let stats = manager.stats().await?;

    let mut platforms = Vec::with_capacity(stats.platforms.len());
    for platform_stats in &stats.platforms {
        let platform = platform_stats.platform;
        let persisted = platform_stats.persisted.as_ref();
        let last_health = manager
            .state()
            .recent_health_checks(platform, 1)
            .await?
            .into_iter()
            .next();
        platforms.push(PlatformStatus {
            platform,
            enabled: platform_stats.configured,
            credentials: authenticated.contains(&platform),
            status: persisted.map(|s| s.status),
            message_count: persisted.map_or(0, |s| s.message_count),
            error_count: persisted.map_or(0, |s| s.error_count),
            last_message_at: persisted.and_then(|s| s.last_message_at),
            last_error: persisted.and_then(|s| s.last_error.clone()),
            last_health,
        });
    }

    let response = StatusResponse {
        last_shutdown_clean: manager.state().was_clean_shutdown().await?,
        store: stats.store,
        indexed: stats.indexed,
        platforms,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }
    Ok(())
}

/// One-word summary of a platform row.
fn label(status: &PlatformStatus) -> &'static str {
    if !status.enabled {
        "disabled"
    } else if !status.credentials {
        "no credentials"
    } else {
        match status.status {
            Some(ConnectionStatus::Connected) => "connected",
            Some(ConnectionStatus::Connecting) => "connecting",
            Some(ConnectionStatus::Error) => "error",
            Some(ConnectionStatus::Disconnected) | None => "disconnected",
        }
    }
}

fn print_status(response: &StatusResponse, use_color: bool) {
    println!();
    println!("  chorus status");
    println!("  {}", "-".repeat(35));
    println!(
        "    Store:    {} messages, {} threads, {} accounts ({} indexed)",
        response.store.messages, response.store.threads, response.store.accounts, response.indexed
    );
    if !response.last_shutdown_clean {
        println!("    Last run: running, or did not shut down cleanly");
    }
    println!();

    for platform in &response.platforms {
        let label = label(platform);
        let mark = if use_color {
            use colored::Colorize;
            match label {
                "connected" => format!("{} {}", "✓".green(), label.green()),
                "error" => format!("{} {}", "✗".red(), label.red()),
                _ => format!("{} {}", "-".dimmed(), label.dimmed()),
            }
        } else {
            match label {
                "connected" => format!("[OK] {label}"),
                "error" => format!("[FAIL] {label}"),
                _ => format!("[--] {label}"),
            }
        };
        println!("    {:<10}{mark}", platform.platform.as_str());
        if platform.message_count > 0 || platform.error_count > 0 {
            let last = platform
                .last_message_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "              {} messages, {} errors, last message {last}",
                platform.message_count, platform.error_count
            );
        }
        if let Some(error) = &platform.last_error {
            println!("              last error: {error}");
        }
        if let Some(check) = &platform.last_health
            && !check.healthy
        {
            println!("              unhealthy: {}", check.issues.join("; "));
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(enabled: bool, credentials: bool, status: Option<ConnectionStatus>) -> PlatformStatus {
        PlatformStatus {
            platform: Platform::Signal,
            enabled,
            credentials,
            status,
            message_count: 0,
            error_count: 0,
            last_message_at: None,
            last_error: None,
            last_health: None,
        }
    }

    #[test]
    fn labels_prefer_configuration_problems() {
        assert_eq!(label(&row(false, true, Some(ConnectionStatus::Connected))), "disabled");
        assert_eq!(label(&row(true, false, None)), "no credentials");
        assert_eq!(label(&row(true, true, None)), "disconnected");
        assert_eq!(label(&row(true, true, Some(ConnectionStatus::Error))), "error");
    }

    #[test]
    fn status_response_serializes() {
        let response = StatusResponse {
            last_shutdown_clean: true,
            store: StoreStats::default(),
            indexed: 0,
            platforms: vec![row(true, true, Some(ConnectionStatus::Connected))],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"last_shutdown_clean\":true"));
        assert!(json.contains("\"status\":\"connected\""));
    }
}
