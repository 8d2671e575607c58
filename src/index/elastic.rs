//! Elasticsearch-compatible REST backend.
//!
//! Searches always go through a server-side scroll cursor: the first request
//! opens it with a 30 second keep-alive, each [`ScrollCursor::next_batch`]
//! fetches the next page, and the cursor is released as soon as a page comes
//! back empty. A cursor dropped before exhaustion is released in the
//! background so abandoned searches do not pin server resources until expiry.
//!
//! # Endpoints used
//!
//! | Operation | Request |
//! |-----------|---------|
//! | index | `PUT /{ns}/_doc/{id}` |
//! | update | `POST /{ns}/_update/{id}` with `doc_as_upsert` |
//! | delete | `DELETE /{ns}/_doc/{id}` |
//! | search | `POST /{ns}/_search?scroll=30s` |
//! | next page | `POST /_search/scroll` |
//! | release | `DELETE /_search/scroll` |

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::{DocumentIndex, IndexError, SearchRequest, SCROLL_KEEP_ALIVE};
use crate::config::IndexConfig;
use crate::models::Namespace;

/// Client for an Elasticsearch-compatible engine.
#[derive(Clone)]
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build index HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Open a scroll cursor for `request`.
    ///
    /// Returns [`IndexError::MalformedQuery`] when the engine rejects the query.
    pub async fn open_scroll(
        &self,
        ns: Namespace,
        request: &SearchRequest,
    ) -> Result<ScrollCursor, IndexError> {
        let resp = self
            .client
            .post(self.url(&format!("{}/_search", ns)))
            .query(&[("scroll", SCROLL_KEEP_ALIVE)])
            .json(&request.to_body())
            .send()
            .await?;

        let page = read_page(resp).await?;
        Ok(ScrollCursor {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            scroll_id: page.scroll_id,
            pending: Some(page.hits),
        })
    }

    async fn write(&self, req: reqwest::RequestBuilder, what: &str) -> Result<()> {
        let resp = req.send().await.map_err(IndexError::from)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IndexError::Http {
            status: status.as_u16(),
            body,
        })
        .with_context(|| format!("Index {} failed", what))
    }
}

#[async_trait]
impl DocumentIndex for ElasticIndex {
    async fn index_document(&self, ns: Namespace, id: i64, doc: &Value) -> Result<()> {
        let req = self
            .client
            .put(self.url(&format!("{}/_doc/{}", ns, id)))
            .json(doc);
        self.write(req, &format!("write {}/{}", ns, id)).await
    }

    async fn update_document(&self, ns: Namespace, id: i64, fields: &Value) -> Result<()> {
        let body = json!({ "doc": fields, "doc_as_upsert": true });
        let req = self
            .client
            .post(self.url(&format!("{}/_update/{}", ns, id)))
            .json(&body);
        self.write(req, &format!("update {}/{}", ns, id)).await
    }

    async fn delete_document(&self, ns: Namespace, id: i64) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("{}/_doc/{}", ns, id)))
            .send()
            .await
            .map_err(IndexError::from)?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IndexError::Http {
            status: status.as_u16(),
            body,
        })
        .with_context(|| format!("Index delete {}/{} failed", ns, id))
    }

    async fn search(&self, ns: Namespace, request: &SearchRequest) -> Result<Vec<Value>> {
        let mut cursor = match self.open_scroll(ns, request).await {
            Ok(cursor) => cursor,
            Err(IndexError::MalformedQuery(reason)) => {
                tracing::debug!(namespace = %ns, query = %request.query, %reason, "malformed query, returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match cursor.collect_all().await {
            Ok(docs) => Ok(docs),
            Err(IndexError::MalformedQuery(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A server-side scroll over one search.
///
/// Lazy, finite and not restartable; reissue the search to start over.
pub struct ScrollCursor {
    client: reqwest::Client,
    base_url: String,
    scroll_id: Option<String>,
    /// Hits from the opening request, handed out by the first `next_batch`.
    pending: Option<Vec<Value>>,
}

impl ScrollCursor {
    /// Next page of document sources. An empty page means the cursor is
    /// exhausted and has been released.
    pub async fn next_batch(&mut self) -> Result<Vec<Value>, IndexError> {
        if let Some(hits) = self.pending.take() {
            if hits.is_empty() {
                self.release().await;
            }
            return Ok(hits);
        }

        let Some(scroll_id) = self.scroll_id.clone() else {
            return Ok(Vec::new());
        };

        let resp = self
            .client
            .post(format!("{}/_search/scroll", self.base_url))
            .json(&json!({ "scroll_id": scroll_id, "scroll": SCROLL_KEEP_ALIVE }))
            .send()
            .await;

        let page = match resp {
            Ok(resp) => read_page(resp).await,
            Err(e) => Err(IndexError::from(e)),
        };

        match page {
            Ok(page) => {
                // The engine may hand back a new id on any page.
                if page.scroll_id.is_some() {
                    self.scroll_id = page.scroll_id;
                }
                if page.hits.is_empty() {
                    self.release().await;
                }
                Ok(page.hits)
            }
            Err(e) => {
                self.release().await;
                Err(e)
            }
        }
    }

    /// Drain every remaining page.
    pub async fn collect_all(&mut self) -> Result<Vec<Value>, IndexError> {
        let mut all = Vec::new();
        loop {
            let batch = self.next_batch().await?;
            if batch.is_empty() {
                return Ok(all);
            }
            all.extend(batch);
        }
    }

    /// Release the server-side cursor. Idempotent; failures are logged only.
    pub async fn release(&mut self) {
        self.pending = None;
        if let Some(scroll_id) = self.scroll_id.take() {
            clear_scroll(&self.client, &self.base_url, scroll_id).await;
        }
    }

    pub fn is_released(&self) -> bool {
        self.scroll_id.is_none()
    }
}

impl Drop for ScrollCursor {
    fn drop(&mut self) {
        let Some(scroll_id) = self.scroll_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                let base_url = self.base_url.clone();
                handle.spawn(async move { clear_scroll(&client, &base_url, scroll_id).await });
            }
            Err(_) => {
                tracing::warn!("scroll cursor dropped outside a runtime; left to expire");
            }
        }
    }
}

async fn clear_scroll(client: &reqwest::Client, base_url: &str, scroll_id: String) {
    let result = client
        .delete(format!("{}/_search/scroll", base_url))
        .json(&json!({ "scroll_id": [scroll_id] }))
        .send()
        .await;
    match result {
        Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {}
        Ok(resp) => tracing::warn!(status = %resp.status(), "failed to release scroll cursor"),
        Err(e) => tracing::warn!(error = %e, "failed to release scroll cursor"),
    }
}

struct Page {
    scroll_id: Option<String>,
    hits: Vec<Value>,
}

async fn read_page(resp: reqwest::Response) -> Result<Page, IndexError> {
    let status = resp.status();
    if status == StatusCode::BAD_REQUEST {
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexError::MalformedQuery(body));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let json: Value = resp.json().await?;
    parse_page(&json)
}

fn parse_page(json: &Value) -> Result<Page, IndexError> {
    let hits = json
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| IndexError::Protocol("missing hits.hits array".to_string()))?;

    Ok(Page {
        scroll_id: json
            .get("_scroll_id")
            .and_then(|s| s.as_str())
            .map(str::to_string),
        hits: hits
            .iter()
            .filter_map(|h| h.get("_source").cloned())
            .collect(),
    })
}
