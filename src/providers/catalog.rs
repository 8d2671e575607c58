//! Scrape-based catalog provider.
//!
//! Ids come from the catalog's JSON title lookup (`?t=<title>&y=<year>`);
//! descriptive metadata is scraped from the HTML title page with a fixed set
//! of patterns. Pages that do not match simply yield fewer fields.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{extract_imdb_id, HttpFetcher, ProviderError, SourceKind, SourceProvider};
use crate::config::CatalogConfig;
use crate::models::{CandidateTitle, ProviderResult};

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>(.*?)\s?\(.*?</title>").expect("title regex"));
static TAGLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)taglines:</h4>\s([^<]+)").expect("tagline regex"));
static PLOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<p itemprop="description">\s*?(.*?)\s*?</p>"#).expect("plot regex")
});
static RATING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"ratingValue">([\d.]+)</span>"#).expect("rating regex"));
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>.*?\(.*?(\d{4}).*?</title>").expect("year regex"));
static COVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link rel='image_src' href="(https?://ia\.media-imdb\.com.+\.jpg)">"#)
        .expect("cover regex")
});
static GENRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href="/genre/(.*?)\?"#).expect("genre regex"));
static LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a href="/language/.+?'url'>(.+?)</a>"#).expect("language regex")
});
static MEDIA_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta property='og:type' content="(.+)" />"#).expect("type regex")
});
static CAST_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<table class="cast_list">(.+?)</table>"#).expect("cast regex"));
static CAST_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<span class="itemprop" itemprop="name">\s*(.+?)\s*</span>"#)
        .expect("cast name regex")
});
static DIRECTOR_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)itemprop="directors?".+?</div>"#).expect("director regex"));
static DIRECTOR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)"name">(.*?)</span>"#).expect("director name regex"));
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

pub struct CatalogProvider {
    http: HttpFetcher,
    lookup_url: String,
    title_url: String,
    api_key: Option<String>,
}

impl CatalogProvider {
    pub fn new(config: &CatalogConfig, http: HttpFetcher) -> Self {
        Self {
            http,
            lookup_url: config.lookup_url.clone(),
            title_url: config.title_url.clone(),
            api_key: config.api_key(),
        }
    }
}

#[async_trait]
impl SourceProvider for CatalogProvider {
    fn name(&self) -> &str {
        "catalog"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Primary
    }

    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let mut query = vec![("t", candidate.title.clone()), ("r", "json".to_string())];
        if let Some(year) = &candidate.year {
            query.push(("y", year.clone()));
        }
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }

        let req = self.http.get(&self.lookup_url).query(&query);
        Ok(self.http.json(req).await?.and_then(|v| parse_lookup(&v)))
    }

    async fn details(&self, imdb_id: &str) -> Result<Option<ProviderResult>, ProviderError> {
        let url = format!("{}tt{}/", self.title_url, imdb_id);
        let Some(page) = self.http.text(self.http.get(&url)).await? else {
            return Ok(None);
        };
        let mut result = parse_title_page(&page);
        result.imdb_id = Some(imdb_id.to_string());
        Ok(Some(result))
    }
}

/// Read the id, title and year out of a JSON title lookup.
pub fn parse_lookup(json: &Value) -> Option<ProviderResult> {
    if json.get("Response").and_then(Value::as_str) == Some("False") {
        return None;
    }
    let id = json
        .get("imdbID")
        .and_then(Value::as_str)
        .and_then(extract_imdb_id)?;

    let mut result = ProviderResult::with_imdb_id(id);
    result.title = str_field(json, "Title");
    result.year = str_field(json, "Year").map(|y| y.chars().take(4).collect());
    Some(result)
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "N/A")
        .map(str::to_string)
}

fn first(re: &Regex, page: &str) -> Option<String> {
    re.captures(page)
        .and_then(|c| c.get(1))
        .map(|m| TAGS.replace_all(m.as_str().trim(), "").trim().to_string())
        .filter(|s| !s.is_empty())
}

fn all(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Scrape descriptive fields from a title page.
pub fn parse_title_page(page: &str) -> ProviderResult {
    let mut result = ProviderResult {
        title: first(&TITLE, page),
        tagline: first(&TAGLINE, page),
        plot: first(&PLOT, page),
        rating: first(&RATING, page).and_then(|r| r.parse().ok()),
        year: first(&YEAR, page),
        cover_url: first(&COVER, page),
        genres: all(&GENRE, page),
        languages: all(&LANGUAGE, page),
        media_type: all(&MEDIA_TYPE, page).into_iter().next(),
        ..ProviderResult::default()
    };

    if let Some(table) = CAST_TABLE.find(page) {
        result.cast = all(&CAST_NAME, table.as_str());
    }
    if let Some(block) = DIRECTOR_BLOCK.find(page) {
        result.directors = all(&DIRECTOR_NAME, block.as_str());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"<html><head><title>The Shawshank Redemption (1994) - IMDb</title>
<link rel='image_src' href="http://ia.media-imdb.com/images/M/poster.jpg">
<meta property='og:type' content="video.movie" />
</head><body>
<span itemprop="ratingValue">9.3</span>
<div class="txt-block" itemprop="director" itemscope>
<a href="/name/nm0001104/"><span class="itemprop" itemprop="name">Frank Darabont</span></a>
</div>
<p itemprop="description">
Two imprisoned men bond over a number of years.</p>
<h4 class="inline">Taglines:</h4> Fear can hold you prisoner.
<a href="/genre/Crime?ref_=tt_ov_inf">Crime</a> <a href="/genre/Drama?ref_=tt_ov_inf">Drama</a>
<table class="cast_list">
<tr><td><span class="itemprop" itemprop="name">Tim Robbins</span></td></tr>
<tr><td><span class="itemprop" itemprop="name"> Morgan Freeman </span></td></tr>
</table>
</body></html>"#;

    #[test]
    fn scrapes_title_page() {
        let r = parse_title_page(PAGE);
        assert_eq!(r.title.as_deref(), Some("The Shawshank Redemption"));
        assert_eq!(r.year.as_deref(), Some("1994"));
        assert_eq!(r.rating, Some(9.3));
        assert_eq!(r.tagline.as_deref(), Some("Fear can hold you prisoner."));
        assert_eq!(r.genres, vec!["Crime", "Drama"]);
        assert_eq!(r.cast, vec!["Tim Robbins", "Morgan Freeman"]);
        assert_eq!(r.directors, vec!["Frank Darabont"]);
        assert_eq!(r.media_type.as_deref(), Some("video.movie"));
        assert_eq!(
            r.cover_url.as_deref(),
            Some("http://ia.media-imdb.com/images/M/poster.jpg")
        );
    }

    #[test]
    fn unrecognized_page_yields_empty_result() {
        let r = parse_title_page("<html>captcha</html>");
        assert!(!r.has_title());
        assert!(r.genres.is_empty());
    }

    #[test]
    fn lookup_reads_id_and_title() {
        let r = parse_lookup(&json!({
            "Title": "Coraline", "Year": "2009", "imdbID": "tt0327597", "Response": "True"
        }))
        .unwrap();
        assert_eq!(r.imdb_id.as_deref(), Some("0327597"));
        assert_eq!(r.title.as_deref(), Some("Coraline"));
        assert_eq!(r.year.as_deref(), Some("2009"));
    }

    #[test]
    fn lookup_miss_is_no_data() {
        assert!(parse_lookup(&json!({"Response": "False", "Error": "Movie not found!"})).is_none());
    }
}
