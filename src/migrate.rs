use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Releases are produced upstream; this crate reads them and writes only
    // the movie link columns.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS releases (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            searchname TEXT NOT NULL,
            fromname TEXT NOT NULL DEFAULT '',
            categories_id INTEGER NOT NULL DEFAULT 0,
            postdate TEXT,
            adddate TEXT,
            imdbid TEXT,
            movie_status TEXT NOT NULL DEFAULT 'pending'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS release_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            releases_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY (releases_id) REFERENCES releases(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predb (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            filename TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movie_info (
            imdbid TEXT PRIMARY KEY,
            tmdbid INTEGER,
            title TEXT NOT NULL DEFAULT '',
            tagline TEXT NOT NULL DEFAULT '',
            rating TEXT NOT NULL DEFAULT '',
            plot TEXT NOT NULL DEFAULT '',
            year TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL DEFAULT '',
            director TEXT NOT NULL DEFAULT '',
            actors TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            trailer TEXT NOT NULL DEFAULT '',
            cover INTEGER NOT NULL DEFAULT 0,
            backdrop INTEGER NOT NULL DEFAULT 0,
            banner INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_release_files_release ON release_files(releases_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_releases_movie_status ON releases(movie_status, categories_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_movie_info_title ON movie_info(title)")
        .execute(pool)
        .await?;

    Ok(())
}
