//! Multi-source movie reconciliation.
//!
//! One release at a time moves through:
//!
//! ```text
//! ParseName → LocalLookup → RemotePrimary → RemoteSecondary → RemoteTertiary
//!           → SearchEngineFallback → Resolved | Unresolved
//! ```
//!
//! The first source that yields an acceptable catalog id wins. A resolved
//! release is linked, and its consolidated record is (re)built from provider
//! details when it is missing or older than the refresh window. This holds
//! for local hits too: a fresh local record costs no remote quota, a stale
//! one is refreshed like any other.
//!
//! Remote sources are guarded by a per-source [`ProviderState`]: an attempt
//! ceiling for the lifetime of the engine and a temporary ban after an
//! anti-automation response. Skipped sources cost nothing.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::config::ReconcileConfig;
use crate::images::ImageCache;
use crate::index::DocumentIndex;
use crate::merge;
use crate::models::{CandidateTitle, LookupStatus, MovieRecord, ProviderResult};
use crate::movie_store::{self, PendingRelease};
use crate::name_parser;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::providers::{ProviderError, SourceKind, SourceProvider};
use crate::rate_limit::{ProviderState, RateLimits};
use crate::similarity::similarity_percent;
use crate::sync;

/// Order in which details are fetched for enrichment.
const DETAILS_ORDER: [SourceKind; 3] =
    [SourceKind::Secondary, SourceKind::Primary, SourceKind::Tertiary];

/// Steps of a single reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParseName,
    LocalLookup,
    RemotePrimary,
    RemoteSecondary,
    RemoteTertiary,
    SearchEngineFallback,
    Resolved,
    Unresolved,
}

impl Stage {
    fn for_kind(kind: SourceKind) -> Stage {
        match kind {
            SourceKind::Local => Stage::LocalLookup,
            SourceKind::Primary => Stage::RemotePrimary,
            SourceKind::Secondary => Stage::RemoteSecondary,
            SourceKind::Tertiary => Stage::RemoteTertiary,
            SourceKind::SearchEngine => Stage::SearchEngineFallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved {
        imdb_id: String,
        source: String,
        /// Whether the consolidated record was written.
        enriched: bool,
    },
    Unresolved,
    NoCandidate,
}

/// Sources in the order the engine consults them.
pub struct ProviderSet {
    pub local: Option<Box<dyn SourceProvider>>,
    /// Remote providers in priority order.
    pub remote: Vec<Box<dyn SourceProvider>>,
    pub engines: Vec<Box<dyn SourceProvider>>,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub limits: RateLimits,
    pub similarity_threshold: f64,
    pub refresh_days: i64,
    pub search_engines: bool,
    pub category_min: i64,
    pub category_max: i64,
}

impl From<&ReconcileConfig> for EngineSettings {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            limits: RateLimits::new(config.rate_ceiling, config.ban_minutes),
            similarity_threshold: config.similarity_threshold,
            refresh_days: config.refresh_days,
            search_engines: config.search_engines,
            category_min: config.category_min,
            category_max: config.category_max,
        }
    }
}

/// Counts from a [`ReconciliationEngine::process_pending`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub processed: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub no_candidate: u64,
}

enum Enrichment {
    Written,
    Unchanged,
    /// No source returned a title for the id.
    NoTitle,
}

pub struct ReconciliationEngine {
    pool: SqlitePool,
    providers: ProviderSet,
    images: Box<dyn ImageCache>,
    settings: EngineSettings,
    states: HashMap<String, ProviderState>,
}

impl ReconciliationEngine {
    pub fn new(
        pool: SqlitePool,
        providers: ProviderSet,
        images: Box<dyn ImageCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            pool,
            providers,
            images,
            settings,
            states: HashMap::new(),
        }
    }

    /// Rate state of a source, if it has been consulted.
    pub fn state(&self, source: &str) -> Option<&ProviderState> {
        self.states.get(source)
    }

    /// Reconcile one release from its search name.
    pub async fn reconcile(&mut self, release_id: i64, searchname: &str) -> Result<Outcome> {
        let Some(candidate) = name_parser::parse(searchname) else {
            tracing::debug!(release_id, searchname, stage = ?Stage::ParseName, "no title candidate");
            movie_store::set_status(&self.pool, release_id, LookupStatus::NoCandidate).await?;
            return Ok(Outcome::NoCandidate);
        };
        tracing::info!(release_id, lookup = %candidate.display_name(), "looking up");

        let mut local_hit = None;
        if let Some(local) = &self.providers.local {
            match local.lookup(&candidate).await {
                Ok(Some(ProviderResult {
                    imdb_id: Some(id), ..
                })) => local_hit = Some((id, local.name().to_string())),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "local lookup failed"),
            }
        }
        if let Some((imdb_id, source)) = local_hit {
            tracing::debug!(release_id, imdb_id = %imdb_id, stage = ?Stage::LocalLookup, "found locally");
            return self.resolve(release_id, imdb_id, source, &candidate).await;
        }

        let mut found = None;
        for idx in 0..self.providers.remote.len() {
            if let Some(hit) = self.try_resolve(Tier::Remote, idx, &candidate).await {
                found = Some(hit);
                break;
            }
        }

        if found.is_none() && self.settings.search_engines && candidate.year.is_some() {
            for idx in 0..self.providers.engines.len() {
                if let Some(hit) = self.try_resolve(Tier::Engines, idx, &candidate).await {
                    found = Some(hit);
                    break;
                }
            }
        }

        match found {
            Some((imdb_id, source)) => self.resolve(release_id, imdb_id, source, &candidate).await,
            None => {
                tracing::info!(release_id, stage = ?Stage::Unresolved, "no source matched");
                movie_store::set_status(&self.pool, release_id, LookupStatus::Unresolved).await?;
                Ok(Outcome::Unresolved)
            }
        }
    }

    /// Process pending releases in the configured category range, re-indexing
    /// each resolved one.
    pub async fn process_pending(
        &mut self,
        index: &dyn DocumentIndex,
        limit: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessStats> {
        let pending: Vec<PendingRelease> = movie_store::pending_releases(
            &self.pool,
            limit,
            self.settings.category_min,
            self.settings.category_max,
        )
        .await?;

        let task = "movies".to_string();
        progress.report(ProgressEvent::Started {
            task: task.clone(),
            total: pending.len() as u64,
        });

        let mut stats = ProcessStats::default();
        for release in &pending {
            match self.reconcile(release.id, &release.searchname).await? {
                Outcome::Resolved { .. } => {
                    stats.resolved += 1;
                    if let Err(e) = sync::reindex_release(&self.pool, index, release.id).await {
                        tracing::warn!(release_id = release.id, error = %e, "reindex failed");
                    }
                }
                Outcome::Unresolved => stats.unresolved += 1,
                Outcome::NoCandidate => stats.no_candidate += 1,
            }
            stats.processed += 1;
            progress.report(ProgressEvent::Tick {
                task: task.clone(),
                n: stats.processed,
            });
        }

        progress.report(ProgressEvent::Done {
            task,
            n: stats.processed,
        });
        Ok(stats)
    }

    async fn resolve(
        &mut self,
        release_id: i64,
        imdb_id: String,
        source: String,
        candidate: &CandidateTitle,
    ) -> Result<Outcome> {
        movie_store::link_release(&self.pool, release_id, &imdb_id).await?;
        tracing::info!(release_id, imdb_id = %imdb_id, %source, stage = ?Stage::Resolved, "resolved");

        let existing = movie_store::get_movie(&self.pool, &imdb_id).await?;
        let refresh_after = self.settings.refresh_days * 86_400;
        let stale = existing
            .as_ref()
            .map_or(true, |m| Utc::now().timestamp() - m.updated_at > refresh_after);
        if !stale {
            return Ok(Outcome::Resolved {
                imdb_id,
                source,
                enriched: false,
            });
        }

        match self.enrich(&imdb_id, candidate, existing.as_ref()).await? {
            Enrichment::Written => Ok(Outcome::Resolved {
                imdb_id,
                source,
                enriched: true,
            }),
            Enrichment::Unchanged => Ok(Outcome::Resolved {
                imdb_id,
                source,
                enriched: false,
            }),
            Enrichment::NoTitle if existing.is_some() => {
                tracing::warn!(imdb_id = %imdb_id, "refresh found no data; keeping existing record");
                Ok(Outcome::Resolved {
                    imdb_id,
                    source,
                    enriched: false,
                })
            }
            Enrichment::NoTitle => {
                tracing::info!(release_id, imdb_id = %imdb_id, "no source describes id");
                movie_store::set_status(&self.pool, release_id, LookupStatus::Unresolved).await?;
                Ok(Outcome::Unresolved)
            }
        }
    }

    /// Fetch details from every permitted source, merge with the existing
    /// record, cache artwork and persist.
    async fn enrich(
        &mut self,
        imdb_id: &str,
        candidate: &CandidateTitle,
        existing: Option<&MovieRecord>,
    ) -> Result<Enrichment> {
        let mut results: Vec<(SourceKind, ProviderResult)> = Vec::new();
        if let Some(record) = existing {
            results.push((SourceKind::Local, merge::local_result(record)));
        }

        for kind in DETAILS_ORDER {
            for idx in 0..self.providers.remote.len() {
                if self.providers.remote[idx].kind() != kind {
                    continue;
                }
                if let Some(result) = self.try_details(idx, imdb_id, candidate).await {
                    results.push((kind, result));
                }
            }
        }

        if !results.iter().any(|(_, r)| r.has_title()) {
            return Ok(Enrichment::NoTitle);
        }

        let merged = merge::merge(imdb_id, &results);
        let mut record = merged.record;
        if let Some(url) = &merged.cover_url {
            record.cover = self.images.save(url, &format!("{}-cover", imdb_id)).await;
        }
        if let Some(url) = &merged.backdrop_url {
            record.backdrop = self.images.save(url, &format!("{}-backdrop", imdb_id)).await;
        }
        if let Some(url) = &merged.banner_url {
            record.banner = self.images.save(url, &format!("{}-banner", imdb_id)).await;
        }

        if movie_store::upsert_movie(&self.pool, &record).await? {
            tracing::info!(imdb_id, title = %record.title, year = %record.year, "movie added/updated");
            Ok(Enrichment::Written)
        } else {
            tracing::info!(imdb_id, "nothing to update for movie");
            Ok(Enrichment::Unchanged)
        }
    }

    /// Check the gate for `source` and count the attempt when permitted.
    fn admit(&mut self, source: &str) -> bool {
        let state = self.states.entry(source.to_string()).or_default();
        if !state.permits(&self.settings.limits, Utc::now()) {
            tracing::debug!(source, calls = state.call_count, "source skipped by rate gate");
            return false;
        }
        state.record_attempt();
        true
    }

    fn provider(&self, tier: Tier, idx: usize) -> &dyn SourceProvider {
        match tier {
            Tier::Remote => self.providers.remote[idx].as_ref(),
            Tier::Engines => self.providers.engines[idx].as_ref(),
        }
    }

    fn record_failure(&mut self, name: &str, err: &ProviderError) {
        match err {
            ProviderError::Banned => {
                let limits = self.settings.limits;
                let state = self.states.entry(name.to_string()).or_default();
                state.ban(&limits, Utc::now());
                tracing::warn!(source = name, until = ?state.banned_until, "source banned us; backing off");
            }
            other => tracing::warn!(source = name, error = %other, "source unavailable"),
        }
    }

    fn similar_enough(&self, candidate: &CandidateTitle, result: &ProviderResult) -> bool {
        match result.title.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(title) => {
                let pct = similarity_percent(&candidate.title, title);
                if pct < self.settings.similarity_threshold {
                    tracing::debug!(
                        candidate = %candidate.title,
                        found = title,
                        similarity = pct,
                        "rejected dissimilar title"
                    );
                    return false;
                }
                true
            }
            None => true,
        }
    }

    async fn try_resolve(
        &mut self,
        tier: Tier,
        idx: usize,
        candidate: &CandidateTitle,
    ) -> Option<(String, String)> {
        let name = self.provider(tier, idx).name().to_string();
        let stage = Stage::for_kind(self.provider(tier, idx).kind());
        if !self.admit(&name) {
            return None;
        }

        let result = self.provider(tier, idx).lookup(candidate).await;
        match result {
            Ok(Some(result)) => {
                let id = result.imdb_id.clone().filter(|id| !id.is_empty())?;
                if !self.similar_enough(candidate, &result) {
                    return None;
                }
                tracing::debug!(source = %name, ?stage, imdb_id = %id, "candidate id found");
                Some((id, name))
            }
            Ok(None) => None,
            Err(e) => {
                self.record_failure(&name, &e);
                None
            }
        }
    }

    async fn try_details(
        &mut self,
        idx: usize,
        imdb_id: &str,
        candidate: &CandidateTitle,
    ) -> Option<ProviderResult> {
        let name = self.providers.remote[idx].name().to_string();
        if !self.admit(&name) {
            return None;
        }

        let result = self.providers.remote[idx].details(imdb_id).await;
        match result {
            Ok(Some(result)) if self.similar_enough(candidate, &result) => Some(result),
            Ok(_) => None,
            Err(e) => {
                self.record_failure(&name, &e);
                None
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Tier {
    Remote,
    Engines,
}
