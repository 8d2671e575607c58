//! # release-index
//!
//! Search indexing and movie metadata reconciliation for a usenet release
//! indexer.
//!
//! Releases and pre-release ("predb") entries live in SQLite. They are
//! mirrored into an Elasticsearch-compatible index for sanitized full-text
//! lookup. A reconciliation engine links movie releases to a canonical
//! catalog id by consulting a local cache, three remote metadata providers
//! and two web search engines, then merges what it finds into one
//! consolidated record per movie.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  sync/reindex  ┌─────────────────┐
//! │   SQLite    │───────────────▶│  Search index   │◀── search
//! │ releases,   │                │ releases, predb │
//! │ predb,      │                └─────────────────┘
//! │ movie_info  │◀──────┐
//! └─────────────┘       │ link + upsert
//!                 ┌─────┴──────────────┐    ┌─────────────────────────┐
//!                 │ ReconciliationEngine│──▶│ local → catalog →       │
//!                 │ parse, gate, merge  │   │ structured → aggregator │
//!                 └────────────────────┘    │ → search engines        │
//!                                           └─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rix init                      # create database
//! rix sync releases             # bulk-load the index
//! rix search releases "coraline 2009"
//! rix movies process --limit 50 # reconcile pending movie releases
//! rix movies show 0327597
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sanitize`] | Query sanitization |
//! | [`index`] | Search index client and in-memory index |
//! | [`search`] | Release and predb search helpers |
//! | [`sync`] | Bulk sync and single-row reindexing |
//! | [`name_parser`] | Release name → title candidate |
//! | [`similarity`] | Title similarity score |
//! | [`rate_limit`] | Per-source attempt ceiling and bans |
//! | [`providers`] | Metadata sources |
//! | [`merge`] | Field-level result merging |
//! | [`movie_store`] | Consolidated movie records and lookup status |
//! | [`images`] | Artwork cache |
//! | [`reconcile`] | Reconciliation engine |
//! | [`progress`] | Batch progress reporting |
//! | [`sources`] | Source listing |

pub mod config;
pub mod db;
pub mod images;
pub mod index;
pub mod merge;
pub mod migrate;
pub mod models;
pub mod movie_store;
pub mod name_parser;
pub mod progress;
pub mod providers;
pub mod rate_limit;
pub mod reconcile;
pub mod sanitize;
pub mod search;
pub mod similarity;
pub mod sources;
pub mod sync;
