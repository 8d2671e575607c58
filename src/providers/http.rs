//! Shared HTTP client for remote providers.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::RequestBuilder;
use serde_json::Value;
use std::time::Duration;

use super::ProviderError;
use crate::config::ProvidersConfig;

/// `reqwest` client carrying the configured user agent, `Accept-Language`
/// and per-call timeout. Cheap to clone.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ProvidersConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.language)
                .with_context(|| format!("Invalid providers.language '{}'", config.language))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build provider HTTP client")?;
        Ok(Self { client })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send and return the body. 404 means "no data"; any other non-2xx
    /// status means the source is unavailable for this attempt.
    pub async fn text(&self, req: RequestBuilder) -> Result<Option<String>, ProviderError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(status.as_u16()));
        }
        Ok(Some(resp.text().await?))
    }

    /// Like [`text`](Self::text) but decodes JSON. Undecodable bodies are
    /// treated as "no data".
    pub async fn json(&self, req: RequestBuilder) -> Result<Option<Value>, ProviderError> {
        let Some(body) = self.text(req).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!(error = %e, "provider returned non-JSON body");
                Ok(None)
            }
        }
    }
}
