//! Web search engines as a last-resort id source.
//!
//! The engine is asked for catalog title pages matching "title year"; the
//! raw result page is scanned with the same id pattern used for provider
//! responses. Only used when the candidate carries a year.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{extract_imdb_id, HttpFetcher, ProviderError, SourceKind, SourceProvider};
use crate::config::SearchEnginesConfig;
use crate::models::{CandidateTitle, ProviderResult};

const SITE: &str = "www.imdb.com/title/";

static GOOGLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(To continue, please type the characters below)|(- did not match any documents\.)")
        .expect("google block regex")
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("non-word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Google,
    Yahoo,
}

pub struct SearchEngineProvider {
    engine: Engine,
    url: String,
    http: HttpFetcher,
}

impl SearchEngineProvider {
    pub fn google(config: &SearchEnginesConfig, http: HttpFetcher) -> Self {
        Self {
            engine: Engine::Google,
            url: config.google_url.clone(),
            http,
        }
    }

    pub fn yahoo(config: &SearchEnginesConfig, http: HttpFetcher) -> Self {
        Self {
            engine: Engine::Yahoo,
            url: config.yahoo_url.clone(),
            http,
        }
    }
}

#[async_trait]
impl SourceProvider for SearchEngineProvider {
    fn name(&self) -> &str {
        match self.engine {
            Engine::Google => "google",
            Engine::Yahoo => "yahoo",
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SearchEngine
    }

    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let Some(year) = &candidate.year else {
            return Ok(None);
        };
        let query = match self.engine {
            Engine::Google => google_query(&candidate.title, year),
            Engine::Yahoo => yahoo_query(&candidate.title, year),
        };
        let req = self.http.get(&self.url).query(&query);
        let Some(page) = self.http.text(req).await? else {
            return Ok(None);
        };
        let id = match self.engine {
            Engine::Google => scan_google_page(&page)?,
            Engine::Yahoo => extract_imdb_id(&page),
        };
        Ok(id.map(ProviderResult::with_imdb_id))
    }
}

/// Advanced-search parameters: exact phrase, restricted to title pages.
pub fn google_query(title: &str, year: &str) -> Vec<(&'static str, String)> {
    let mut q: Vec<(&'static str, String)> = vec![
        ("hl", "en".to_string()),
        ("as_q", String::new()),
        ("as_epq", format!("{} {}", title, year)),
    ];
    for key in ["as_oq", "as_eq", "as_nlo", "as_nhi", "lr", "cr"] {
        q.push((key, String::new()));
    }
    q.push(("as_qdr", "all".to_string()));
    q.push(("as_sitesearch", SITE.to_string()));
    q.push(("as_occt", "title".to_string()));
    q.push(("safe", "images".to_string()));
    for key in ["tbs", "as_filetype", "as_rights"] {
        q.push((key, String::new()));
    }
    q
}

/// Title words joined with `+`, then the year, restricted to title pages.
pub fn yahoo_query(title: &str, year: &str) -> Vec<(&'static str, String)> {
    let cleaned = NON_WORD.replace_all(title, " ");
    let terms = cleaned.split_whitespace().collect::<Vec<_>>().join("+");

    vec![
        ("n", "10".to_string()),
        ("ei", "UTF-8".to_string()),
        ("va_vt", "title".to_string()),
        ("vo_vt", "any".to_string()),
        ("ve_vt", "any".to_string()),
        ("vp_vt", "any".to_string()),
        ("vf", "all".to_string()),
        ("vm", "p".to_string()),
        ("fl", "0".to_string()),
        ("fr", "fp-top".to_string()),
        ("p", format!("{}+{}", terms, year)),
        ("vs", SITE.to_string()),
    ]
}

/// A challenge page bans the engine; a "no results" page is simply no data.
pub fn scan_google_page(page: &str) -> Result<Option<String>, ProviderError> {
    if let Some(caps) = GOOGLE_BLOCK.captures(page) {
        if caps.get(1).is_some() {
            return Err(ProviderError::Banned);
        }
        return Ok(None);
    }
    Ok(extract_imdb_id(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_page_bans() {
        let page = "<p>To continue, please type the characters below:</p>";
        assert!(matches!(scan_google_page(page), Err(ProviderError::Banned)));
    }

    #[test]
    fn empty_results_are_no_data() {
        let page = "Your search - Coraline 2009 - did not match any documents.";
        assert!(matches!(scan_google_page(page), Ok(None)));
    }

    #[test]
    fn result_page_yields_id() {
        let page = r#"<a href="https://www.imdb.com/title/tt0327597/">Coraline (2009) - IMDb</a>"#;
        assert_eq!(scan_google_page(page).unwrap().as_deref(), Some("0327597"));
    }

    #[test]
    fn yahoo_terms_are_plus_joined() {
        let q = yahoo_query("Some Movie: Part II", "2010");
        let p = q.iter().find(|(k, _)| *k == "p").map(|(_, v)| v.as_str());
        assert_eq!(p, Some("Some+Movie+Part+II+2010"));
    }

    #[test]
    fn google_uses_exact_phrase() {
        let q = google_query("Coraline", "2009");
        assert!(q.contains(&("as_epq", "Coraline 2009".to_string())));
        assert!(q.contains(&("as_sitesearch", SITE.to_string())));
    }
}
