//! Metadata sources consulted during reconciliation.
//!
//! Every source implements [`SourceProvider`]. The engine asks each one for a
//! catalog id ([`lookup`](SourceProvider::lookup)) and, once an id is known,
//! for descriptive metadata ([`details`](SourceProvider::details)).
//!
//! | Provider | Kind | Backend |
//! |----------|------|---------|
//! | [`local::LocalProvider`] | Local | `movie_info` table |
//! | [`catalog::CatalogProvider`] | Primary | JSON title lookup + title page scrape |
//! | [`structured::StructuredProvider`] | Secondary | structured movie API |
//! | [`aggregator::AggregatorProvider`] | Tertiary | text aggregator + artwork API |
//! | [`search_engine::SearchEngineProvider`] | SearchEngine | HTML result pages |
//!
//! Parse failures are "no data", never errors. Errors are reserved for the
//! source being unreachable, answering non-2xx, or refusing automation.

pub mod aggregator;
pub mod catalog;
pub mod http;
pub mod local;
pub mod search_engine;
pub mod structured;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::Config;
use crate::models::{CandidateTitle, ProviderResult};

pub use aggregator::AggregatorProvider;
pub use catalog::CatalogProvider;
pub use http::HttpFetcher;
pub use local::LocalProvider;
pub use search_engine::SearchEngineProvider;
pub use structured::StructuredProvider;

/// Role of a source in the priority rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Local,
    /// Scrape-based catalog.
    Primary,
    /// Structured API.
    Secondary,
    /// Text aggregator plus artwork aggregator.
    Tertiary,
    SearchEngine,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Primary => "primary",
            SourceKind::Secondary => "secondary",
            SourceKind::Tertiary => "tertiary",
            SourceKind::SearchEngine => "search-engine",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("source answered HTTP {0}")]
    Unavailable(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("source refused automated access")]
    Banned,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable name; keys the per-source rate state.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Find a catalog id for `candidate`.
    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError>;

    /// Descriptive metadata for a known catalog id.
    async fn details(&self, _imdb_id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        Ok(None)
    }
}

static IMDB_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:imdb.*?)?(?:tt|Title\?)(?P<imdbid>\d{5,8})").expect("imdb id regex")
});

/// Pull the first catalog id (digits only) out of arbitrary text.
pub fn extract_imdb_id(text: &str) -> Option<String> {
    IMDB_ID
        .captures(text)
        .and_then(|c| c.name("imdbid"))
        .map(|m| m.as_str().to_string())
}

/// Remote providers in resolution priority order, then search engines.
pub struct RemoteProviders {
    pub remote: Vec<Box<dyn SourceProvider>>,
    pub engines: Vec<Box<dyn SourceProvider>>,
}

/// Build every enabled remote provider from configuration.
pub fn build_remote(config: &Config) -> anyhow::Result<RemoteProviders> {
    let http = HttpFetcher::new(&config.providers)?;
    let mut remote: Vec<Box<dyn SourceProvider>> = Vec::new();
    let mut engines: Vec<Box<dyn SourceProvider>> = Vec::new();

    let providers = &config.providers;
    if providers.catalog.enabled {
        remote.push(Box::new(CatalogProvider::new(&providers.catalog, http.clone())));
    }
    if providers.structured.enabled {
        match providers.structured.api_key() {
            Some(_) => remote.push(Box::new(StructuredProvider::new(
                &providers.structured,
                http.clone(),
            ))),
            None => tracing::warn!("structured provider enabled but no API key configured; skipping"),
        }
    }
    if providers.aggregator.enabled {
        remote.push(Box::new(AggregatorProvider::new(
            &providers.aggregator,
            http.clone(),
        )));
    }
    if config.reconcile.search_engines {
        engines.push(Box::new(SearchEngineProvider::google(
            &providers.search_engines,
            http.clone(),
        )));
        engines.push(Box::new(SearchEngineProvider::yahoo(
            &providers.search_engines,
            http,
        )));
    }

    Ok(RemoteProviders { remote, engines })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_urls_and_prefixed_strings() {
        assert_eq!(extract_imdb_id("tt0111161").as_deref(), Some("0111161"));
        assert_eq!(
            extract_imdb_id("<a href=\"https://www.imdb.com/title/tt1375666/\">").as_deref(),
            Some("1375666")
        );
        assert_eq!(extract_imdb_id("imdb.com/Title?0133093").as_deref(), Some("0133093"));
        assert_eq!(extract_imdb_id("tt10872600").as_deref(), Some("10872600"));
    }

    #[test]
    fn short_or_missing_ids_are_ignored() {
        assert_eq!(extract_imdb_id("tt1234"), None);
        assert_eq!(extract_imdb_id("nothing to see"), None);
    }
}
