//! Document index abstraction.
//!
//! The [`DocumentIndex`] trait covers every operation the sync service and
//! search helpers need, enabling pluggable backends:
//!
//! - [`elastic::ElasticIndex`]: Elasticsearch-compatible REST client with
//!   scroll pagination.
//! - [`memory::InMemoryIndex`]: process-local index for tests and dry runs.
//!
//! Writes are fire-and-forget: a document becomes searchable after the
//! engine's refresh interval, never synchronously.

pub mod elastic;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::Namespace;

pub use elastic::ElasticIndex;
pub use memory::InMemoryIndex;

/// Scroll keep-alive sent with every search and scroll request.
pub const SCROLL_KEEP_ALIVE: &str = "30s";

/// Errors raised at the index boundary.
///
/// [`IndexError::MalformedQuery`] never leaves a search call; it is turned
/// into an empty result. The other variants propagate.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("index returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("index transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected index response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Desc,
        }
    }
}

/// Ordering of a search.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Sort {
    /// Ingestion date, then source-content date, both descending.
    #[default]
    Default,
    Fields(Vec<SortField>),
    /// Engine relevance order.
    Unsorted,
}

impl Sort {
    pub fn fields(&self) -> Vec<SortField> {
        match self {
            Sort::Default => vec![SortField::desc("add_date"), SortField::desc("post_date")],
            Sort::Fields(fields) => fields.clone(),
            Sort::Unsorted => Vec::new(),
        }
    }
}

/// A `query_string` search restricted to `fields`.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Already-sanitized query text.
    pub query: String,
    pub fields: Vec<String>,
    /// Batch size. The scroll keeps fetching batches until one comes back empty.
    pub limit: usize,
    pub sort: Sort,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, fields: &[&str], limit: usize) -> Self {
        Self {
            query: query.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            limit,
            sort: Sort::Default,
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Request body in the engine's query DSL.
    pub fn to_body(&self) -> Value {
        let mut body = serde_json::json!({
            "query": {
                "query_string": {
                    "query": self.query,
                    "fields": self.fields,
                    "analyze_wildcard": true,
                    "default_operator": "AND",
                }
            },
            "size": self.limit,
        });

        let sort: Vec<Value> = self
            .sort
            .fields()
            .iter()
            .map(|s| serde_json::json!({ s.field.clone(): { "order": s.order.as_str() } }))
            .collect();
        if !sort.is_empty() {
            body["sort"] = Value::Array(sort);
        }
        body
    }
}

/// Abstract document index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`index_document`](DocumentIndex::index_document) | Insert or overwrite a document |
/// | [`update_document`](DocumentIndex::update_document) | Partial update, upsert if absent |
/// | [`delete_document`](DocumentIndex::delete_document) | Remove a document |
/// | [`search`](DocumentIndex::search) | Run a query, draining the scroll |
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn index_document(&self, ns: Namespace, id: i64, doc: &Value) -> Result<()>;

    /// Merge `fields` into the stored document; when none exists, `fields`
    /// becomes the whole document.
    async fn update_document(&self, ns: Namespace, id: i64, fields: &Value) -> Result<()>;

    /// Deleting an absent document succeeds.
    async fn delete_document(&self, ns: Namespace, id: i64) -> Result<()>;

    /// Every matching document source. A malformed query yields `Ok(vec![])`.
    async fn search(&self, ns: Namespace, request: &SearchRequest) -> Result<Vec<Value>>;

    /// Like [`search`](DocumentIndex::search) but projects the `id` field.
    async fn search_ids(&self, ns: Namespace, request: &SearchRequest) -> Result<Vec<i64>> {
        let docs = self.search(ns, request).await?;
        Ok(docs.iter().filter_map(document_id).collect())
    }
}

/// Read the numeric `id` out of a stored document.
pub fn document_id(doc: &Value) -> Option<i64> {
    match doc.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
