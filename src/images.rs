//! Artwork cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// Stores artwork under a basename such as `0327597-cover`.
#[async_trait]
pub trait ImageCache: Send + Sync {
    /// Download and store `url`. Returns whether the image is now cached;
    /// failures are logged, never raised.
    async fn save(&self, url: &str, basename: &str) -> bool;
}

/// Images saved as `<dir>/<basename>.jpg`.
pub struct FsImageCache {
    client: reqwest::Client,
    dir: PathBuf,
}

impl FsImageCache {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.providers.user_agent.clone())
            .timeout(Duration::from_secs(config.providers.timeout_secs))
            .build()
            .context("Failed to build image HTTP client")?;
        Ok(Self {
            client,
            dir: config.images.dir.clone(),
        })
    }

    pub fn path_for(&self, basename: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", basename))
    }

    async fn fetch(&self, url: &str, basename: &str) -> Result<()> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            anyhow::bail!("empty image body");
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        tokio::fs::write(self.path_for(basename), &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageCache for FsImageCache {
    async fn save(&self, url: &str, basename: &str) -> bool {
        match self.fetch(url, basename).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%url, basename, error = %e, "failed to cache image");
                false
            }
        }
    }
}
