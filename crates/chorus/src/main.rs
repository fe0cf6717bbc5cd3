// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chorus - multi-platform message sync daemon.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod query;
mod serve;
mod status;

use std::path::PathBuf;

use chorus_core::{MessageKind, Platform};
use clap::{Parser, Subcommand};

/// Chorus - multi-platform message sync daemon.
#[derive(Parser, Debug)]
#[command(name = "chorus", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync daemon until SIGINT or SIGTERM.
    Serve,
    /// Show per-platform connection state and store totals.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Full-text search over stored messages.
    Search {
        /// Search terms; all must match.
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        kind: Option<MessageKind>,
        /// Only messages at or after this time (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,
        /// Only messages before this time (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,
        /// Restrict to one thread id.
        #[arg(long)]
        thread: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Most recent messages across all platforms.
    Recent {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show the latest messages of one thread.
    Thread {
        id: String,
        #[arg(long, short = 'n', default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the search index from the content store.
    Reindex,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chorus_config::load_and_validate_path(path),
        None => chorus_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chorus_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Search {
            query,
            platform,
            kind,
            since,
            until,
            thread,
            limit,
            json,
        }) => {
            let args = query::SearchArgs {
                query: query.join(" "),
                platform,
                kind,
                since,
                until,
                thread,
                limit,
            };
            query::run_search(&config, args, json).await
        }
        Some(Commands::Recent { limit, json }) => query::run_recent(&config, limit, json).await,
        Some(Commands::Thread { id, limit, json }) => {
            query::run_thread(&config, &id, limit, json).await
        }
        Some(Commands::Reindex) => query::run_reindex(&config).await,
        None => {
            println!("chorus: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("chorus: {e}");
        std::process::exit(1);
    }
}
