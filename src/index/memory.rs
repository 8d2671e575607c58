//! In-memory [`DocumentIndex`] implementation for tests and dry runs.
//!
//! Documents live in a `BTreeMap` per namespace behind `std::sync::RwLock`.
//! Matching is a case-insensitive AND over query terms against the requested
//! fields: a term is found when it occurs as a substring of any field. Escape
//! backslashes are ignored, a leading `-` or `!` negates a term, and other
//! operator characters are stripped.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentIndex, SearchRequest, SortOrder};
use crate::models::Namespace;

/// Process-local index.
pub struct InMemoryIndex {
    docs: RwLock<HashMap<Namespace, BTreeMap<i64, Value>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Stored document, if any.
    pub fn get(&self, ns: Namespace, id: i64) -> Option<Value> {
        let docs = self.docs.read().ok()?;
        docs.get(&ns).and_then(|m| m.get(&id)).cloned()
    }

    pub fn len(&self, ns: Namespace) -> usize {
        self.docs
            .read()
            .map(|d| d.get(&ns).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, ns: Namespace) -> bool {
        self.len(ns) == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn index_document(&self, ns: Namespace, id: i64, doc: &Value) -> Result<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.entry(ns).or_default().insert(id, doc.clone());
        Ok(())
    }

    async fn update_document(&self, ns: Namespace, id: i64, fields: &Value) -> Result<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        let entry = docs
            .entry(ns)
            .or_default()
            .entry(id)
            .or_insert_with(|| Value::Object(Default::default()));
        match (entry.as_object_mut(), fields.as_object()) {
            (Some(existing), Some(new)) => {
                for (k, v) in new {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => *entry = fields.clone(),
        }
        Ok(())
    }

    async fn delete_document(&self, ns: Namespace, id: i64) -> Result<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        if let Some(map) = docs.get_mut(&ns) {
            map.remove(&id);
        }
        Ok(())
    }

    async fn search(&self, ns: Namespace, request: &SearchRequest) -> Result<Vec<Value>> {
        let terms = parse_terms(&request.query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.docs.read().map_err(|_| poisoned())?;
        let Some(map) = docs.get(&ns) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Value> = map
            .values()
            .filter(|doc| matches(doc, &request.fields, &terms))
            .cloned()
            .collect();

        let sort = request.sort.fields();
        if !sort.is_empty() {
            hits.sort_by(|a, b| {
                for s in &sort {
                    let ord = compare_field(a.get(&s.field), b.get(&s.field));
                    let ord = match s.order {
                        SortOrder::Asc => ord,
                        SortOrder::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        Ok(hits)
    }
}

struct Term {
    text: String,
    negated: bool,
}

fn parse_terms(query: &str) -> Vec<Term> {
    query
        .split_whitespace()
        .filter_map(|raw| {
            let negated = raw.starts_with(['-', '!']);
            let mut text = String::with_capacity(raw.len());
            let mut chars = raw.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            text.push(escaped);
                        }
                    }
                    '!' | '+' | '-' | '?' | '*' => {}
                    _ => text.push(c),
                }
            }
            let text = text.to_lowercase();
            (!text.is_empty()).then_some(Term { text, negated })
        })
        .collect()
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

fn matches(doc: &Value, fields: &[String], terms: &[Term]) -> bool {
    let haystacks: Vec<String> = fields
        .iter()
        .filter_map(|f| doc.get(f))
        .map(field_text)
        .collect();
    terms.iter().all(|term| {
        let found = haystacks.iter().any(|h| h.contains(&term.text));
        found != term.negated
    })
}

/// Missing values sort before present ones in ascending order.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => field_text(x).cmp(&field_text(y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Sort;
    use serde_json::json;

    #[tokio::test]
    async fn and_semantics_across_fields() {
        let index = InMemoryIndex::new();
        index
            .index_document(Namespace::Releases, 1, &json!({"id": 1, "name": "Foo Bar", "fromname": "x"}))
            .await
            .unwrap();
        index
            .index_document(Namespace::Releases, 2, &json!({"id": 2, "name": "Foo", "fromname": "baz"}))
            .await
            .unwrap();

        let req = SearchRequest::new("foo bar", &["name", "fromname"], 10);
        assert_eq!(index.search_ids(Namespace::Releases, &req).await.unwrap(), vec![1]);

        let req = SearchRequest::new("foo -bar", &["name", "fromname"], 10);
        assert_eq!(index.search_ids(Namespace::Releases, &req).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn update_merges_and_upserts() {
        let index = InMemoryIndex::new();
        index
            .update_document(Namespace::Predb, 5, &json!({"id": 5, "title": "a"}))
            .await
            .unwrap();
        index
            .update_document(Namespace::Predb, 5, &json!({"source": "s"}))
            .await
            .unwrap();
        let doc = index.get(Namespace::Predb, 5).unwrap();
        assert_eq!(doc["title"], "a");
        assert_eq!(doc["source"], "s");
    }

    #[tokio::test]
    async fn default_sort_is_newest_first() {
        let index = InMemoryIndex::new();
        for (id, date) in [(1, "2020-01-01 00:00:00"), (2, "2022-01-01 00:00:00"), (3, "2021-01-01 00:00:00")] {
            index
                .index_document(Namespace::Releases, id, &json!({"id": id, "name": "movie", "add_date": date}))
                .await
                .unwrap();
        }
        let req = SearchRequest::new("movie", &["name"], 10);
        assert_eq!(
            index.search_ids(Namespace::Releases, &req).await.unwrap(),
            vec![2, 3, 1]
        );
        let req = req.with_sort(Sort::Unsorted);
        assert_eq!(
            index.search_ids(Namespace::Releases, &req).await.unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn escaped_terms_match_literally() {
        let index = InMemoryIndex::new();
        index
            .index_document(Namespace::Predb, 1, &json!({"id": 1, "title": "AC/DC Live"}))
            .await
            .unwrap();
        let req = SearchRequest::new("AC\\/DC", &["title"], 10);
        assert_eq!(index.search_ids(Namespace::Predb, &req).await.unwrap(), vec![1]);
    }
}
