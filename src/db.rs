//! SQLite connection handling for the relational source of truth.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;

/// Open (creating if needed) the database named in `[db].path`.
///
/// Used by `rix init`; every other command goes through [`connect_existing`].
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    open(db_path, true).await
}

/// Open an already-initialized database. A missing file is fatal.
pub async fn connect_existing(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run `rix init` first.",
            db_path.display()
        );
    }
    open(db_path, false).await
}

async fn open(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    Ok(pool)
}
