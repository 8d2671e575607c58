//! Core data models used throughout release-index.
//!
//! These types represent the indexed documents, the ephemeral lookup values
//! that flow through reconciliation, and the consolidated movie record.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical partition of the search index. The set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Namespace {
    Releases,
    Predb,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Releases, Namespace::Predb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Releases => "releases",
            Namespace::Predb => "predb",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "releases" => Ok(Namespace::Releases),
            "predb" => Ok(Namespace::Predb),
            other => bail!(
                "Unknown index '{}'. releases and predb are the only supported ones.",
                other
            ),
        }
    }
}

/// Indexed form of a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDocument {
    pub id: i64,
    pub name: String,
    pub searchname: String,
    /// `searchname` with `.` and `-` turned into spaces.
    pub plainsearchname: String,
    pub fromname: String,
    pub categories_id: i64,
    /// Space-joined names of the release's files.
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,
    /// Catalog id once the release has been reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdbid: Option<String>,
}

impl ReleaseDocument {
    pub fn plain_search_name(searchname: &str) -> String {
        searchname.replace(['.', '-'], " ")
    }
}

/// Indexed form of a pre-release database entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredbDocument {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub source: String,
}

/// Title and optional year parsed from a release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTitle {
    pub title: String,
    pub year: Option<String>,
}

impl CandidateTitle {
    /// `Title (Year)` when the year is known, otherwise the bare title.
    pub fn display_name(&self) -> String {
        match &self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }

    pub fn year_number(&self) -> Option<i32> {
        self.year.as_deref().and_then(|y| y.parse().ok())
    }
}

/// Partial metadata returned by one provider. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResult {
    /// Canonical catalog id, digits only (no `tt` prefix).
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i64>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub rating: Option<f64>,
    pub plot: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<String>,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
    pub languages: Vec<String>,
    pub media_type: Option<String>,
    pub trailer: Option<String>,
    pub cover_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub banner_url: Option<String>,
}

impl ProviderResult {
    pub fn with_imdb_id(imdb_id: impl Into<String>) -> Self {
        Self {
            imdb_id: Some(imdb_id.into()),
            ..Self::default()
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Per-release progress of the movie lookup.
///
/// Stored in its own column so "deliberately unresolvable" never looks like
/// a catalog id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    Pending,
    Resolved,
    /// The release name did not yield a usable title.
    NoCandidate,
    /// Every source was tried and none matched.
    Unresolved,
}

impl LookupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::Pending => "pending",
            LookupStatus::Resolved => "resolved",
            LookupStatus::NoCandidate => "no_candidate",
            LookupStatus::Unresolved => "unresolved",
        }
    }
}

impl FromStr for LookupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "pending" => LookupStatus::Pending,
            "resolved" => LookupStatus::Resolved,
            "no_candidate" => LookupStatus::NoCandidate,
            "unresolved" => LookupStatus::Unresolved,
            other => bail!("Unknown lookup status: {}", other),
        })
    }
}

/// Consolidated movie metadata, one row per catalog id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovieRecord {
    pub imdb_id: String,
    pub tmdb_id: Option<i64>,
    pub title: String,
    pub tagline: String,
    pub rating: String,
    pub plot: String,
    pub year: String,
    pub genre: String,
    pub media_type: String,
    pub director: String,
    pub actors: String,
    pub language: String,
    pub trailer: String,
    pub cover: bool,
    pub backdrop: bool,
    pub banner: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MovieRecord {
    /// True when no column besides the key carries a value.
    pub fn is_empty(&self) -> bool {
        self.tmdb_id.is_none()
            && [
                &self.title,
                &self.tagline,
                &self.rating,
                &self.plot,
                &self.year,
                &self.genre,
                &self.media_type,
                &self.director,
                &self.actors,
                &self.language,
                &self.trailer,
            ]
            .iter()
            .all(|v| v.trim().is_empty())
            && !self.cover
            && !self.backdrop
            && !self.banner
    }
}
