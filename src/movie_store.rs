//! Persistence for consolidated movie records and release lookup state.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::models::{CandidateTitle, LookupStatus, MovieRecord};

const YEAR_WINDOW: i32 = 2;

/// Year filter covering `year ± 2`, with its bind values.
fn year_clause(candidate: &CandidateTitle) -> (String, Vec<String>) {
    match candidate.year_number() {
        Some(year) => {
            let years: Vec<String> = (year - YEAR_WINDOW..=year + YEAR_WINDOW)
                .map(|y| y.to_string())
                .collect();
            let placeholders = vec!["?"; years.len()].join(", ");
            (format!(" AND year IN ({})", placeholders), years)
        }
        None => (String::new(), Vec::new()),
    }
}

/// `%word%word%` with quotes and exclamation marks removed.
fn fuzzy_pattern(title: &str) -> String {
    let mut pattern = String::from("%");
    for piece in title.split(' ') {
        pattern.push_str(&piece.replace(['\'', '!', '"'], ""));
        pattern.push('%');
    }
    pattern
}

async fn find_one(
    pool: &SqlitePool,
    column: &str,
    pattern: &str,
    years: &(String, Vec<String>),
) -> Result<Option<String>, sqlx::Error> {
    let sql = format!(
        "SELECT imdbid FROM movie_info WHERE {} LIKE ?{} LIMIT 1",
        column, years.0
    );
    let mut query = sqlx::query(&sql).bind(pattern);
    for year in &years.1 {
        query = query.bind(year);
    }
    let row = query.fetch_optional(pool).await?;
    Ok(row
        .map(|r| r.get::<String, _>("imdbid"))
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())))
}

/// Search consolidated records for a candidate.
///
/// Passes, first hit wins: title substring; fuzzy word pattern ignoring
/// punctuation; the same two with `er` spelled `re`.
pub async fn find_local(
    pool: &SqlitePool,
    candidate: &CandidateTitle,
) -> Result<Option<String>, sqlx::Error> {
    let years = year_clause(candidate);
    let title = &candidate.title;
    let stripped = r#"replace(replace(replace(title, '''', ''), '!', ''), '"', '')"#;

    if let Some(id) = find_one(pool, "title", &format!("%{}%", title), &years).await? {
        return Ok(Some(id));
    }
    if let Some(id) = find_one(pool, stripped, &fuzzy_pattern(title), &years).await? {
        return Ok(Some(id));
    }

    let variant = title.replace("er", "re");
    if variant == *title {
        return Ok(None);
    }
    if let Some(id) = find_one(pool, "title", &format!("%{}%", variant), &years).await? {
        return Ok(Some(id));
    }
    find_one(pool, stripped, &fuzzy_pattern(&variant), &years).await
}

pub async fn get_movie(pool: &SqlitePool, imdb_id: &str) -> Result<Option<MovieRecord>> {
    let row = sqlx::query(
        "SELECT imdbid, tmdbid, title, tagline, rating, plot, year, genre, type, director,
                actors, language, trailer, cover, backdrop, banner, created_at, updated_at
         FROM movie_info WHERE imdbid = ?",
    )
    .bind(imdb_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to read movie {}", imdb_id))?;

    Ok(row.map(|row| MovieRecord {
        imdb_id: row.get("imdbid"),
        tmdb_id: row.get("tmdbid"),
        title: row.get("title"),
        tagline: row.get("tagline"),
        rating: row.get("rating"),
        plot: row.get("plot"),
        year: row.get("year"),
        genre: row.get("genre"),
        media_type: row.get("type"),
        director: row.get("director"),
        actors: row.get("actors"),
        language: row.get("language"),
        trailer: row.get("trailer"),
        cover: row.get::<i64, _>("cover") != 0,
        backdrop: row.get::<i64, _>("backdrop") != 0,
        banner: row.get::<i64, _>("banner") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Insert or update a record without overwriting set columns with empty
/// values. Returns `false` when the record carries nothing to write.
pub async fn upsert_movie(pool: &SqlitePool, record: &MovieRecord) -> Result<bool> {
    if record.is_empty() {
        return Ok(false);
    }
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO movie_info (imdbid, tmdbid, title, tagline, rating, plot, year, genre, type,
                                director, actors, language, trailer, cover, backdrop, banner,
                                created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(imdbid) DO UPDATE SET
            tmdbid = COALESCE(excluded.tmdbid, movie_info.tmdbid),
            title = COALESCE(NULLIF(excluded.title, ''), movie_info.title),
            tagline = COALESCE(NULLIF(excluded.tagline, ''), movie_info.tagline),
            rating = COALESCE(NULLIF(excluded.rating, ''), movie_info.rating),
            plot = COALESCE(NULLIF(excluded.plot, ''), movie_info.plot),
            year = COALESCE(NULLIF(excluded.year, ''), movie_info.year),
            genre = COALESCE(NULLIF(excluded.genre, ''), movie_info.genre),
            type = COALESCE(NULLIF(excluded.type, ''), movie_info.type),
            director = COALESCE(NULLIF(excluded.director, ''), movie_info.director),
            actors = COALESCE(NULLIF(excluded.actors, ''), movie_info.actors),
            language = COALESCE(NULLIF(excluded.language, ''), movie_info.language),
            trailer = COALESCE(NULLIF(excluded.trailer, ''), movie_info.trailer),
            cover = MAX(excluded.cover, movie_info.cover),
            backdrop = MAX(excluded.backdrop, movie_info.backdrop),
            banner = MAX(excluded.banner, movie_info.banner),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.imdb_id)
    .bind(record.tmdb_id)
    .bind(&record.title)
    .bind(&record.tagline)
    .bind(&record.rating)
    .bind(&record.plot)
    .bind(&record.year)
    .bind(&record.genre)
    .bind(&record.media_type)
    .bind(&record.director)
    .bind(&record.actors)
    .bind(&record.language)
    .bind(&record.trailer)
    .bind(record.cover as i64)
    .bind(record.backdrop as i64)
    .bind(record.banner as i64)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to write movie {}", record.imdb_id))?;

    Ok(true)
}

/// Point a release at a catalog id and mark it resolved.
pub async fn link_release(pool: &SqlitePool, release_id: i64, imdb_id: &str) -> Result<()> {
    sqlx::query("UPDATE releases SET imdbid = ?, movie_status = ? WHERE id = ?")
        .bind(imdb_id)
        .bind(LookupStatus::Resolved.as_str())
        .bind(release_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to link release {}", release_id))?;
    Ok(())
}

/// Record a terminal or pending status. Any non-resolved status clears the
/// release's catalog id.
pub async fn set_status(pool: &SqlitePool, release_id: i64, status: LookupStatus) -> Result<()> {
    let sql = if status == LookupStatus::Resolved {
        "UPDATE releases SET movie_status = ? WHERE id = ?"
    } else {
        "UPDATE releases SET movie_status = ?, imdbid = NULL WHERE id = ?"
    };
    sqlx::query(sql)
        .bind(status.as_str())
        .bind(release_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update status of release {}", release_id))?;
    Ok(())
}

/// A release awaiting movie lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelease {
    pub id: i64,
    pub searchname: String,
}

/// Pending releases within a category range, oldest id first.
pub async fn pending_releases(
    pool: &SqlitePool,
    limit: u32,
    category_min: i64,
    category_max: i64,
) -> Result<Vec<PendingRelease>> {
    let rows = sqlx::query(
        "SELECT id, searchname FROM releases
         WHERE movie_status = ? AND categories_id BETWEEN ? AND ?
         ORDER BY id ASC LIMIT ?",
    )
    .bind(LookupStatus::Pending.as_str())
    .bind(category_min)
    .bind(category_max)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to read pending releases")?;

    Ok(rows
        .iter()
        .map(|row| PendingRelease {
            id: row.get("id"),
            searchname: row.get("searchname"),
        })
        .collect())
}

/// Return releases to `pending`. Without an id, only releases that ended
/// `no_candidate` or `unresolved` are reset. Returns the number of rows reset.
pub async fn reset_status(pool: &SqlitePool, release_id: Option<i64>) -> Result<u64> {
    let result = match release_id {
        Some(id) => {
            sqlx::query("UPDATE releases SET movie_status = ?, imdbid = NULL WHERE id = ?")
                .bind(LookupStatus::Pending.as_str())
                .bind(id)
                .execute(pool)
                .await
        }
        None => {
            sqlx::query(
                "UPDATE releases SET movie_status = ?, imdbid = NULL
                 WHERE movie_status IN (?, ?)",
            )
            .bind(LookupStatus::Pending.as_str())
            .bind(LookupStatus::NoCandidate.as_str())
            .bind(LookupStatus::Unresolved.as_str())
            .execute(pool)
            .await
        }
    }
    .context("Failed to reset lookup status")?;
    Ok(result.rows_affected())
}

pub async fn release_status(pool: &SqlitePool, release_id: i64) -> Result<Option<(LookupStatus, Option<String>)>> {
    let row = sqlx::query("SELECT movie_status, imdbid FROM releases WHERE id = ?")
        .bind(release_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to read release {}", release_id))?;
    match row {
        Some(row) => {
            let status: String = row.get("movie_status");
            Ok(Some((status.parse()?, row.get("imdbid"))))
        }
        None => Ok(None),
    }
}
