//! Relational → index synchronization.
//!
//! [`bulk_sync`] walks a table in primary-key order using a forward-only
//! watermark and writes every row into the matching index namespace. The
//! single-row helpers keep the index current as individual releases change.
//!
//! # Bulk algorithm
//!
//! ```text
//! (total, min_id) ← COUNT(id), MIN(id)
//! last_id ← min_id - 1
//! repeat at most total / batch_size + 1 times:
//!     rows ← WHERE id > last_id ORDER BY id LIMIT batch_size
//!     stop if rows is empty
//!     index each row; last_id ← max id seen
//! ```

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::index::DocumentIndex;
use crate::models::{Namespace, PredbDocument, ReleaseDocument};
use crate::progress::{ProgressEvent, ProgressReporter};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RELEASE_SELECT: &str = r#"
    SELECT r.id, r.name, r.searchname, r.fromname, r.categories_id,
           r.postdate, r.adddate, r.imdbid,
           COALESCE(GROUP_CONCAT(rf.name, ' '), '') AS filename
    FROM releases r
    LEFT JOIN release_files rf ON rf.releases_id = r.id
"#;

/// Summary of a [`bulk_sync`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub total: u64,
    pub batches: u64,
    pub indexed: u64,
    /// Highest id written, if any.
    pub last_id: Option<i64>,
}

/// Copy every row of `ns` from the database into the index.
pub async fn bulk_sync(
    pool: &SqlitePool,
    index: &dyn DocumentIndex,
    ns: Namespace,
    batch_size: u32,
    progress: &dyn ProgressReporter,
) -> Result<SyncStats> {
    if batch_size == 0 {
        bail!("batch_size must be at least 1");
    }

    let table = match ns {
        Namespace::Releases => "releases",
        Namespace::Predb => "predb",
    };
    let task = format!("sync {}", ns);

    let row = sqlx::query(&format!("SELECT COUNT(id) AS total, MIN(id) AS min_id FROM {}", table))
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count rows in {}", table))?;
    let total: i64 = row.get("total");
    let min_id: Option<i64> = row.get("min_id");

    let mut stats = SyncStats {
        total: total as u64,
        ..SyncStats::default()
    };
    progress.report(ProgressEvent::Started {
        task: task.clone(),
        total: stats.total,
    });

    let Some(min_id) = min_id else {
        progress.report(ProgressEvent::Done { task, n: 0 });
        return Ok(stats);
    };

    let max_batches = stats.total / batch_size as u64 + 1;
    let mut last_id = min_id - 1;

    while stats.batches < max_batches {
        let count = match ns {
            Namespace::Releases => {
                let docs = fetch_releases(pool, last_id, batch_size).await?;
                for doc in &docs {
                    index
                        .index_document(ns, doc.id, &serde_json::to_value(doc)?)
                        .await?;
                    last_id = last_id.max(doc.id);
                    stats.indexed += 1;
                    progress.report(ProgressEvent::Tick {
                        task: task.clone(),
                        n: stats.indexed,
                    });
                }
                docs.len()
            }
            Namespace::Predb => {
                let docs = fetch_predb(pool, last_id, batch_size).await?;
                for doc in &docs {
                    index
                        .index_document(ns, doc.id, &serde_json::to_value(doc)?)
                        .await?;
                    last_id = last_id.max(doc.id);
                    stats.indexed += 1;
                    progress.report(ProgressEvent::Tick {
                        task: task.clone(),
                        n: stats.indexed,
                    });
                }
                docs.len()
            }
        };

        if count == 0 {
            break;
        }
        stats.batches += 1;
        stats.last_id = Some(last_id);
        tracing::debug!(namespace = %ns, batch = stats.batches, last_id, "batch indexed");
    }

    progress.report(ProgressEvent::Done {
        task,
        n: stats.indexed,
    });
    tracing::info!(namespace = %ns, indexed = stats.indexed, batches = stats.batches, "sync complete");
    Ok(stats)
}

async fn fetch_releases(pool: &SqlitePool, after: i64, limit: u32) -> Result<Vec<ReleaseDocument>> {
    let sql = format!(
        "{} WHERE r.id > ? GROUP BY r.id ORDER BY r.id ASC LIMIT ?",
        RELEASE_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(after)
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .context("Failed to read releases batch")?;
    Ok(rows.iter().map(release_from_row).collect())
}

async fn fetch_predb(pool: &SqlitePool, after: i64, limit: u32) -> Result<Vec<PredbDocument>> {
    let rows = sqlx::query(
        "SELECT id, title, filename, source FROM predb WHERE id > ? ORDER BY id ASC LIMIT ?",
    )
    .bind(after)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to read predb batch")?;
    Ok(rows.iter().map(predb_from_row).collect())
}

fn release_from_row(row: &sqlx::sqlite::SqliteRow) -> ReleaseDocument {
    let searchname: String = row.get("searchname");
    ReleaseDocument {
        id: row.get("id"),
        name: row.get("name"),
        plainsearchname: ReleaseDocument::plain_search_name(&searchname),
        searchname,
        fromname: row.get("fromname"),
        categories_id: row.get("categories_id"),
        filename: row.get("filename"),
        add_date: row.get("adddate"),
        post_date: row.get("postdate"),
        imdbid: row.get("imdbid"),
    }
}

fn predb_from_row(row: &sqlx::sqlite::SqliteRow) -> PredbDocument {
    PredbDocument {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        source: row.get("source"),
    }
}

/// Load one release in its indexed form.
pub async fn load_release(pool: &SqlitePool, id: i64) -> Result<Option<ReleaseDocument>> {
    let sql = format!("{} WHERE r.id = ? GROUP BY r.id", RELEASE_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to read release {}", id))?;
    Ok(row.as_ref().map(release_from_row))
}

pub async fn load_predb(pool: &SqlitePool, id: i64) -> Result<Option<PredbDocument>> {
    let row = sqlx::query("SELECT id, title, filename, source FROM predb WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to read predb entry {}", id))?;
    Ok(row.as_ref().map(predb_from_row))
}

/// Index a freshly added release, stamping `add_date` with the current time.
///
/// Returns `false` when the release does not exist.
pub async fn index_new_release(
    pool: &SqlitePool,
    index: &dyn DocumentIndex,
    id: i64,
) -> Result<bool> {
    let Some(mut doc) = load_release(pool, id).await? else {
        return Ok(false);
    };
    doc.add_date = Some(Utc::now().format(DATE_FORMAT).to_string());
    index
        .index_document(Namespace::Releases, id, &serde_json::to_value(&doc)?)
        .await?;
    Ok(true)
}

/// Push the current database state of one release as an upserting update.
pub async fn reindex_release(
    pool: &SqlitePool,
    index: &dyn DocumentIndex,
    id: i64,
) -> Result<bool> {
    let Some(doc) = load_release(pool, id).await? else {
        return Ok(false);
    };
    index
        .update_document(Namespace::Releases, id, &serde_json::to_value(&doc)?)
        .await?;
    Ok(true)
}

pub async fn reindex_predb(pool: &SqlitePool, index: &dyn DocumentIndex, id: i64) -> Result<bool> {
    let Some(doc) = load_predb(pool, id).await? else {
        return Ok(false);
    };
    index
        .update_document(Namespace::Predb, id, &serde_json::to_value(&doc)?)
        .await?;
    Ok(true)
}

/// Dispatch a single-row reindex by namespace.
pub async fn reindex(
    pool: &SqlitePool,
    index: &dyn DocumentIndex,
    ns: Namespace,
    id: i64,
) -> Result<bool> {
    match ns {
        Namespace::Releases => reindex_release(pool, index, id).await,
        Namespace::Predb => reindex_predb(pool, index, id).await,
    }
}
