//! Structured movie API provider.
//!
//! Resolution searches by title (and year), then fetches the first hit to
//! learn its catalog id. Details are fetched directly by catalog id.

use async_trait::async_trait;
use serde_json::Value;

use super::{HttpFetcher, ProviderError, SourceKind, SourceProvider};
use crate::config::StructuredConfig;
use crate::models::{CandidateTitle, ProviderResult};

pub struct StructuredProvider {
    http: HttpFetcher,
    base_url: String,
    image_url: String,
    api_key: String,
}

impl StructuredProvider {
    pub fn new(config: &StructuredConfig, http: HttpFetcher) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_url: config.image_url.trim_end_matches('/').to_string(),
            api_key: config.api_key().unwrap_or_default(),
        }
    }

    async fn movie(&self, id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        let req = self
            .http
            .get(&format!("{}/movie/{}", self.base_url, id))
            .query(&[("api_key", self.api_key.as_str())]);
        Ok(self
            .http
            .json(req)
            .await?
            .and_then(|v| parse_movie(&v, &self.image_url)))
    }
}

#[async_trait]
impl SourceProvider for StructuredProvider {
    fn name(&self) -> &str {
        "structured"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Secondary
    }

    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let mut query = vec![
            ("api_key", self.api_key.clone()),
            ("query", candidate.title.clone()),
        ];
        if let Some(year) = &candidate.year {
            query.push(("year", year.clone()));
        }
        let req = self
            .http
            .get(&format!("{}/search/movie", self.base_url))
            .query(&query);

        let Some(hit) = self.http.json(req).await?.and_then(|v| first_search_hit(&v)) else {
            return Ok(None);
        };
        self.movie(&hit.to_string()).await
    }

    async fn details(&self, imdb_id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        self.movie(&format!("tt{}", imdb_id)).await
    }
}

/// Id of the first search result.
pub fn first_search_hit(json: &Value) -> Option<i64> {
    json.get("results")?
        .as_array()?
        .first()?
        .get("id")?
        .as_i64()
}

/// Map a movie resource into a provider result. Resources without an
/// original title are treated as no data.
pub fn parse_movie(json: &Value, image_url: &str) -> Option<ProviderResult> {
    let text = |key: &str| {
        json.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let title = text("original_title").or_else(|| text("title"))?;
    let imdb_id = text("imdb_id").map(|id| id.trim_start_matches("tt").to_string());

    Some(ProviderResult {
        imdb_id,
        tmdb_id: json.get("id").and_then(Value::as_i64),
        title: Some(title),
        year: text("release_date")
            .map(|d| d.chars().take(4).collect::<String>())
            .filter(|y| y.len() == 4),
        rating: json
            .get("vote_average")
            .and_then(Value::as_f64)
            .filter(|v| *v != 0.0),
        plot: text("overview"),
        tagline: text("tagline"),
        genres: json
            .get("genres")
            .and_then(Value::as_array)
            .map(|genres| {
                genres
                    .iter()
                    .filter_map(|g| g.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        cover_url: text("poster_path").map(|p| format!("{}/w185{}", image_url, p)),
        backdrop_url: text("backdrop_path").map(|p| format!("{}/original{}", image_url, p)),
        ..ProviderResult::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_movie_resource() {
        let movie = json!({
            "id": 14836,
            "imdb_id": "tt0327597",
            "original_title": "Coraline",
            "title": "Coraline",
            "vote_average": 7.4,
            "overview": "A girl finds a door.",
            "tagline": "Be careful what you wish for.",
            "release_date": "2009-02-05",
            "genres": [{"id": 16, "name": "Animation"}, {"id": 14, "name": "Fantasy"}],
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg"
        });
        let r = parse_movie(&movie, "https://image.tmdb.org/t/p").unwrap();
        assert_eq!(r.imdb_id.as_deref(), Some("0327597"));
        assert_eq!(r.tmdb_id, Some(14836));
        assert_eq!(r.year.as_deref(), Some("2009"));
        assert_eq!(r.rating, Some(7.4));
        assert_eq!(r.genres, vec!["Animation", "Fantasy"]);
        assert_eq!(
            r.cover_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w185/poster.jpg")
        );
        assert_eq!(
            r.backdrop_url.as_deref(),
            Some("https://image.tmdb.org/t/p/original/backdrop.jpg")
        );
    }

    #[test]
    fn zero_vote_is_no_rating() {
        let r = parse_movie(&json!({"original_title": "X", "vote_average": 0}), "").unwrap();
        assert_eq!(r.rating, None);
    }

    #[test]
    fn search_hit_and_missing_results() {
        assert_eq!(first_search_hit(&json!({"results": [{"id": 5}, {"id": 6}]})), Some(5));
        assert_eq!(first_search_hit(&json!({"results": []})), None);
    }
}
