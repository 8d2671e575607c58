use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{ProviderError, SourceKind, SourceProvider};
use crate::models::{CandidateTitle, ProviderResult};
use crate::movie_store;

/// Already-consolidated records. Never counts against remote quotas.
pub struct LocalProvider {
    pool: SqlitePool,
}

impl LocalProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn lookup(
        &self,
        candidate: &CandidateTitle,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let found = movie_store::find_local(&self.pool, candidate).await?;
        Ok(found.map(ProviderResult::with_imdb_id))
    }
}
