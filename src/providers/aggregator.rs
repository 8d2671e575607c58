//! Aggregator provider: a community text API plus an artwork API.
//!
//! The text API resolves titles and supplies fallback descriptive fields;
//! the artwork API supplies the preferred cover, backdrop and banner. Either
//! half is skipped when its credential is missing.

use async_trait::async_trait;
use serde_json::Value;

use super::{HttpFetcher, ProviderError, SourceKind, SourceProvider};
use crate::config::AggregatorConfig;
use crate::models::{CandidateTitle, ProviderResult};

const API_VERSION: &str = "2";

pub struct AggregatorProvider {
    http: HttpFetcher,
    base_url: String,
    client_id: Option<String>,
    artwork_url: String,
    artwork_api_key: Option<String>,
}

impl AggregatorProvider {
    pub fn new(config: &AggregatorConfig, http: HttpFetcher) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id(),
            artwork_url: config.artwork_url.clone(),
            artwork_api_key: config.artwork_api_key(),
        }
    }

    fn text_request(&self, path: &str, client_id: &str) -> reqwest::RequestBuilder {
        self.http
            .get(&format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("trakt-api-key", client_id)
            .header("trakt-api-version", API_VERSION)
    }

    async fn summary(&self, imdb_id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        let Some(client_id) = &self.client_id else {
            return Ok(None);
        };
        let req = self
            .text_request(&format!("movies/tt{}", imdb_id), client_id)
            .query(&[("extended", "full")]);
        Ok(self.http.json(req).await?.and_then(|v| parse_summary(&v)))
    }

    async fn artwork(&self, imdb_id: &str) -> Result<Option<Artwork>, ProviderError> {
        let Some(key) = &self.artwork_api_key else {
            return Ok(None);
        };
        let req = self
            .http
            .get(&format!("{}tt{}", self.artwork_url, imdb_id))
            .query(&[("api_key", key.as_str())]);
        Ok(self.http.json(req).await?.and_then(|v| parse_artwork(&v)))
    }
}

#[async_trait]
impl SourceProvider for AggregatorProvider {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Tertiary
    }

    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let Some(client_id) = &self.client_id else {
            return Ok(None);
        };
        let mut query = vec![("query", candidate.title.clone())];
        if let Some(year) = &candidate.year {
            query.push(("years", year.clone()));
        }
        let req = self.text_request("search/movie", client_id).query(&query);
        Ok(self.http.json(req).await?.and_then(|v| parse_search(&v)))
    }

    /// The text and artwork halves fail independently. A failed half counts
    /// as no data; the error surfaces only when neither half produced any.
    async fn details(&self, imdb_id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        let mut failure = None;

        let mut result = match self.summary(imdb_id).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(imdb_id, error = %e, "aggregator text API failed");
                failure = Some(e);
                None
            }
        };

        match self.artwork(imdb_id).await {
            Ok(Some(art)) => {
                let r = result.get_or_insert_with(|| ProviderResult::with_imdb_id(imdb_id));
                r.cover_url = Some(art.cover);
                r.backdrop_url = Some(art.backdrop);
                r.banner_url = art.banner;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(imdb_id, error = %e, "aggregator artwork API failed");
                if !matches!(failure, Some(ProviderError::Banned)) {
                    failure = Some(e);
                }
            }
        }

        match (result, failure) {
            (None, Some(e)) => Err(e),
            (result, _) => Ok(result),
        }
    }
}

/// First movie in a text search response.
pub fn parse_search(json: &Value) -> Option<ProviderResult> {
    let movie = json.as_array()?.first()?.get("movie")?;
    parse_summary(movie)
}

/// Map a movie summary. A summary without a title is no data.
pub fn parse_summary(movie: &Value) -> Option<ProviderResult> {
    let text = |key: &str| {
        movie
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let title = text("title")?;
    let ids = movie.get("ids");

    Some(ProviderResult {
        imdb_id: ids
            .and_then(|i| i.get("imdb"))
            .and_then(Value::as_str)
            .map(|id| id.trim_start_matches("tt").to_string())
            .filter(|id| !id.is_empty()),
        tmdb_id: ids.and_then(|i| i.get("tmdb")).and_then(Value::as_i64),
        title: Some(title),
        year: movie.get("year").and_then(Value::as_i64).map(|y| y.to_string()),
        rating: movie
            .get("rating")
            .and_then(Value::as_f64)
            .filter(|r| *r != 0.0),
        plot: text("overview"),
        tagline: text("tagline"),
        genres: movie
            .get("genres")
            .and_then(Value::as_array)
            .map(|g| {
                g.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        languages: text("language").into_iter().collect(),
        trailer: text("trailer").map(|t| embed_trailer(&t)),
        ..ProviderResult::default()
    })
}

/// Watch links become embeddable https links.
fn embed_trailer(url: &str) -> String {
    url.replace("watch?v=", "embed/").replace("http://", "https://")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub cover: String,
    pub backdrop: String,
    pub banner: Option<String>,
}

fn first_url(json: &Value, key: &str) -> Option<String> {
    json.get(key)?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Artwork is usable only when both a cover and a backdrop exist.
pub fn parse_artwork(json: &Value) -> Option<Artwork> {
    if json.get("status").and_then(Value::as_str) == Some("error") {
        return None;
    }
    let backdrop = first_url(json, "moviebackground").or_else(|| first_url(json, "moviethumb"))?;
    let cover = first_url(json, "movieposter")?;
    Some(Artwork {
        cover,
        backdrop,
        banner: first_url(json, "moviebanner"),
    })
}
