pub mod doctor;
pub mod registry;
pub mod resync;
pub mod session;

use anyhow::{Context, Result};
use rusqlite::Connection;

use conductor::config::ConductorConfig;

/// Open the configured database for a CLI command.
fn open_db(config: &ConductorConfig) -> Result<Connection> {
    let path = config.resolved_db_path();
    conductor::db::open_database(&path)
        .with_context(|| format!("cannot open database at {}", path.display()))
}
