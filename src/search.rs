//! Search helpers for each index call site.
//!
//! Every helper sanitizes its input before it reaches the engine, so a
//! release name can be passed straight through. Malformed queries surface as
//! empty results (see [`DocumentIndex::search`]).

use anyhow::Result;
use serde_json::Value;

use crate::index::{DocumentIndex, SearchRequest, Sort};
use crate::models::Namespace;
use crate::sanitize::{sanitize, Phrases};

const RELEASE_FIELDS: [&str; 6] = [
    "searchname",
    "plainsearchname",
    "fromname",
    "filename",
    "name",
    "categories_id",
];
const RELEASE_TITLE_FIELDS: [&str; 2] = ["searchname", "plainsearchname"];
const PREDB_TITLE_FIELDS: [&str; 1] = ["title"];
const PREDB_FULL_FIELDS: [&str; 2] = ["title", "filename"];

/// Page size for pre-release title lookups.
pub const PREDB_LIMIT: usize = 1000;

/// Release ids matching `phrases` across every release field, newest first.
pub async fn release_search<'a>(
    index: &dyn DocumentIndex,
    phrases: impl Into<Phrases<'a>>,
    limit: usize,
) -> Result<Vec<i64>> {
    let query = sanitize(phrases);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let request = SearchRequest::new(query, &RELEASE_FIELDS, limit);
    index.search_ids(Namespace::Releases, &request).await
}

/// Release ids matching on the search name only. Used by the TV, movie and
/// anime lookups.
pub async fn release_title_search<'a>(
    index: &dyn DocumentIndex,
    phrases: impl Into<Phrases<'a>>,
    limit: usize,
) -> Result<Vec<i64>> {
    let query = sanitize(phrases);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let request = SearchRequest::new(query, &RELEASE_TITLE_FIELDS, limit);
    index.search_ids(Namespace::Releases, &request).await
}

/// Pre-release ids whose title matches, in relevance order.
pub async fn predb_title_search(index: &dyn DocumentIndex, phrase: &str) -> Result<Vec<i64>> {
    let query = sanitize(phrase);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let request =
        SearchRequest::new(query, &PREDB_TITLE_FIELDS, PREDB_LIMIT).with_sort(Sort::Unsorted);
    index.search_ids(Namespace::Predb, &request).await
}

/// Full pre-release documents matching on title or file name.
pub async fn predb_full_search<'a>(
    index: &dyn DocumentIndex,
    phrases: impl Into<Phrases<'a>>,
) -> Result<Vec<Value>> {
    let query = sanitize(phrases);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let request =
        SearchRequest::new(query, &PREDB_FULL_FIELDS, PREDB_LIMIT).with_sort(Sort::Unsorted);
    index.search(Namespace::Predb, &request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use serde_json::json;

    async fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .index_document(
                Namespace::Releases,
                1,
                &json!({"id": 1, "name": "x", "searchname": "Some.Movie.2010.720p",
                        "plainsearchname": "Some Movie 2010 720p", "fromname": "poster",
                        "filename": "a.mkv", "categories_id": 2040}),
            )
            .await
            .unwrap();
        index
            .index_document(
                Namespace::Predb,
                9,
                &json!({"id": 9, "title": "Some.Movie.2010.720p-GRP", "filename": "grp-sm", "source": "x"}),
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn release_search_sanitizes_dotted_names() {
        let index = seeded().await;
        let ids = release_search(&index, "Some.Movie.2010", 100).await.unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn title_search_ignores_sender() {
        let index = seeded().await;
        assert!(release_title_search(&index, "poster", 100).await.unwrap().is_empty());
        assert_eq!(release_title_search(&index, "movie", 100).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn predb_searches() {
        let index = seeded().await;
        assert_eq!(predb_title_search(&index, "Some Movie").await.unwrap(), vec![9]);
        let docs = predb_full_search(&index, "grp-sm").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["source"], "x");
    }

    #[tokio::test]
    async fn empty_phrase_does_not_query() {
        let index = seeded().await;
        assert!(release_search(&index, "   ", 10).await.unwrap().is_empty());
    }
}
