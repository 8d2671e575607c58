//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to defaults, so a
//! minimal config only names the SQLite path:
//!
//! ```toml
//! [db]
//! path = "./data/rix.sqlite"
//!
//! [index]
//! url = "http://localhost:9200"
//!
//! [providers.structured]
//! api_key = "..."
//! ```
//!
//! API keys can also come from the environment (`OMDB_API_KEY`,
//! `TMDB_API_KEY`, `TRAKT_CLIENT_ID`, `FANART_API_KEY`); an inline value wins.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> u32 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    /// Maximum number of pending releases handled per `movies process` run.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_refresh_days")]
    pub refresh_days: i64,
    #[serde(default = "default_category_min")]
    pub category_min: i64,
    #[serde(default = "default_category_max")]
    pub category_max: i64,
    #[serde(default = "default_rate_ceiling")]
    pub rate_ceiling: u32,
    #[serde(default = "default_ban_minutes")]
    pub ban_minutes: i64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Fall back to scraping search engines when every provider missed.
    #[serde(default = "default_true")]
    pub search_engines: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            refresh_days: default_refresh_days(),
            category_min: default_category_min(),
            category_max: default_category_max(),
            rate_ceiling: default_rate_ceiling(),
            ban_minutes: default_ban_minutes(),
            similarity_threshold: default_similarity_threshold(),
            search_engines: true,
        }
    }
}

fn default_limit() -> u32 {
    100
}
fn default_refresh_days() -> i64 {
    30
}
fn default_category_min() -> i64 {
    2000
}
fn default_category_max() -> i64 {
    2999
}
fn default_rate_ceiling() -> u32 {
    40
}
fn default_ban_minutes() -> i64 {
    10
}
fn default_similarity_threshold() -> f64 {
    40.0
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub structured: StructuredConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub search_engines: SearchEnginesConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            language: default_language(),
            timeout_secs: default_provider_timeout(),
            catalog: CatalogConfig::default(),
            structured: StructuredConfig::default(),
            aggregator: AggregatorConfig::default(),
            search_engines: SearchEnginesConfig::default(),
        }
    }
}

fn default_user_agent() -> String {
    format!("release-index/{}", env!("CARGO_PKG_VERSION"))
}
fn default_language() -> String {
    "en".to_string()
}
fn default_provider_timeout() -> u64 {
    15
}

/// Scrape-based catalog: JSON title lookup plus HTML title pages.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
    #[serde(default = "default_title_url")]
    pub title_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_url: default_lookup_url(),
            title_url: default_title_url(),
            api_key: None,
        }
    }
}

fn default_lookup_url() -> String {
    "http://www.omdbapi.com/".to_string()
}
fn default_title_url() -> String {
    "https://www.imdb.com/title/".to_string()
}

/// Token-authenticated structured movie API.
#[derive(Debug, Deserialize, Clone)]
pub struct StructuredConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_structured_url")]
    pub base_url: String,
    #[serde(default = "default_structured_image_url")]
    pub image_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_structured_url(),
            image_url: default_structured_image_url(),
            api_key: None,
        }
    }
}

fn default_structured_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}
fn default_structured_image_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

/// Text aggregator plus artwork aggregator, both keyed by catalog id.
#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_aggregator_url")]
    pub base_url: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_artwork_url")]
    pub artwork_url: String,
    #[serde(default)]
    pub artwork_api_key: Option<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_aggregator_url(),
            client_id: None,
            artwork_url: default_artwork_url(),
            artwork_api_key: None,
        }
    }
}

fn default_aggregator_url() -> String {
    "https://api.trakt.tv".to_string()
}
fn default_artwork_url() -> String {
    "https://webservice.fanart.tv/v3/movies/".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchEnginesConfig {
    #[serde(default = "default_google_url")]
    pub google_url: String,
    #[serde(default = "default_yahoo_url")]
    pub yahoo_url: String,
}

impl Default for SearchEnginesConfig {
    fn default() -> Self {
        Self {
            google_url: default_google_url(),
            yahoo_url: default_yahoo_url(),
        }
    }
}

fn default_google_url() -> String {
    "https://www.google.com/search".to_string()
}
fn default_yahoo_url() -> String {
    "https://search.yahoo.com/search".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
        }
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("./data/covers/movies")
}

impl CatalogConfig {
    pub fn api_key(&self) -> Option<String> {
        key_or_env(&self.api_key, "OMDB_API_KEY")
    }
}

impl StructuredConfig {
    pub fn api_key(&self) -> Option<String> {
        key_or_env(&self.api_key, "TMDB_API_KEY")
    }
}

impl AggregatorConfig {
    pub fn client_id(&self) -> Option<String> {
        key_or_env(&self.client_id, "TRAKT_CLIENT_ID")
    }

    pub fn artwork_api_key(&self) -> Option<String> {
        key_or_env(&self.artwork_api_key, "FANART_API_KEY")
    }
}

fn key_or_env(inline: &Option<String>, var: &str) -> Option<String> {
    inline
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sync.batch_size == 0 {
        anyhow::bail!("sync.batch_size must be > 0");
    }

    if config.reconcile.refresh_days < 1 {
        anyhow::bail!("reconcile.refresh_days must be >= 1");
    }

    if config.reconcile.category_min > config.reconcile.category_max {
        anyhow::bail!("reconcile.category_min must be <= reconcile.category_max");
    }

    if !(0.0..=100.0).contains(&config.reconcile.similarity_threshold) {
        anyhow::bail!("reconcile.similarity_threshold must be in [0, 100]");
    }

    if config.reconcile.ban_minutes < 0 {
        anyhow::bail!("reconcile.ban_minutes must be >= 0");
    }

    if !config.index.url.starts_with("http://") && !config.index.url.starts_with("https://") {
        anyhow::bail!(
            "index.url must be an http(s) URL, got '{}'",
            config.index.url
        );
    }

    Ok(())
}
