// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chorus_core::ChorusError;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), ChorusError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(ChorusError::storage)?;
    let applied = report.applied_migrations();
    if !applied.is_empty() {
        info!(count = applied.len(), "applied search index migrations");
    }
    Ok(())
}
