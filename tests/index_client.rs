//! ElasticIndex against an in-process fake of the search engine's REST API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use release_index::config::IndexConfig;
use release_index::index::{DocumentIndex, ElasticIndex, SearchRequest};
use release_index::models::Namespace;
use release_index::search;

#[derive(Default)]
struct FakeEngine {
    docs: HashMap<String, BTreeMap<i64, Value>>,
    scrolls: HashMap<String, Vec<Vec<Value>>>,
    cleared: Vec<String>,
    next_scroll: u64,
    fail_scroll_pages: bool,
}

type Shared = Arc<Mutex<FakeEngine>>;

fn hits_page(scroll_id: &str, hits: Vec<Value>) -> Value {
    let hits: Vec<Value> = hits
        .into_iter()
        .map(|doc| json!({ "_id": doc["id"].to_string(), "_source": doc }))
        .collect();
    json!({ "_scroll_id": scroll_id, "hits": { "hits": hits } })
}

fn field_text(doc: &Value, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(s)) => s.to_lowercase(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

async fn put_doc(
    State(engine): State<Shared>,
    Path((ns, id)): Path<(String, i64)>,
    Json(doc): Json<Value>,
) -> StatusCode {
    let mut engine = engine.lock().unwrap();
    engine.docs.entry(ns).or_default().insert(id, doc);
    StatusCode::CREATED
}

async fn delete_doc(
    State(engine): State<Shared>,
    Path((ns, id)): Path<(String, i64)>,
) -> StatusCode {
    let mut engine = engine.lock().unwrap();
    match engine.docs.entry(ns).or_default().remove(&id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn update_doc(
    State(engine): State<Shared>,
    Path((ns, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> StatusCode {
    assert_eq!(body["doc_as_upsert"], true);
    let mut engine = engine.lock().unwrap();
    let docs = engine.docs.entry(ns).or_default();
    let stored = docs.entry(id).or_insert_with(|| json!({}));
    if let (Some(stored), Some(fields)) = (stored.as_object_mut(), body["doc"].as_object()) {
        for (k, v) in fields {
            stored.insert(k.clone(), v.clone());
        }
    }
    StatusCode::OK
}

async fn open_search(
    State(engine): State<Shared>,
    Path(ns): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let query = body["query"]["query_string"]["query"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    if query.contains("malformed") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "query_shard_exception" } })),
        );
    }
    let fields: Vec<String> = body["query"]["query_string"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap().to_string())
        .collect();
    let size = body["size"].as_u64().unwrap() as usize;
    let terms: Vec<String> = query
        .replace('\\', "")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut engine = engine.lock().unwrap();
    let matches: Vec<Value> = engine
        .docs
        .get(&ns)
        .map(|docs| {
            docs.values()
                .filter(|doc| {
                    terms
                        .iter()
                        .all(|t| fields.iter().any(|f| field_text(doc, f).contains(t.as_str())))
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    engine.next_scroll += 1;
    let scroll_id = format!("scroll-{}", engine.next_scroll);
    let mut pages: Vec<Vec<Value>> = matches.chunks(size.max(1)).map(|c| c.to_vec()).collect();
    let first = if pages.is_empty() {
        Vec::new()
    } else {
        pages.remove(0)
    };
    engine.scrolls.insert(scroll_id.clone(), pages);
    (StatusCode::OK, Json(hits_page(&scroll_id, first)))
}

async fn scroll_page(
    State(engine): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let scroll_id = body["scroll_id"].as_str().unwrap().to_string();
    let mut engine = engine.lock().unwrap();
    if engine.fail_scroll_pages {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" })));
    }
    let next = match engine.scrolls.get_mut(&scroll_id) {
        Some(pages) if !pages.is_empty() => pages.remove(0),
        Some(_) => Vec::new(),
        None => return (StatusCode::NOT_FOUND, Json(json!({ "error": "no such scroll" }))),
    };
    (StatusCode::OK, Json(hits_page(&scroll_id, next)))
}

async fn clear_scroll(State(engine): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let mut engine = engine.lock().unwrap();
    for id in body["scroll_id"].as_array().unwrap() {
        let id = id.as_str().unwrap().to_string();
        engine.scrolls.remove(&id);
        engine.cleared.push(id);
    }
    StatusCode::OK
}

async fn start_fake() -> (ElasticIndex, Shared) {
    let engine: Shared = Arc::new(Mutex::new(FakeEngine::default()));
    let app = Router::new()
        .route("/_search/scroll", post(scroll_page).delete(clear_scroll))
        .route("/{ns}/_doc/{id}", put(put_doc).delete(delete_doc))
        .route("/{ns}/_update/{id}", post(update_doc))
        .route("/{ns}/_search", post(open_search))
        .with_state(engine.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = IndexConfig {
        url: format!("http://{}", addr),
        timeout_secs: 5,
    };
    (ElasticIndex::new(&config).unwrap(), engine)
}

fn release(id: i64, searchname: &str) -> Value {
    json!({
        "id": id,
        "name": searchname,
        "searchname": searchname,
        "plainsearchname": searchname.replace('.', " "),
        "fromname": "poster@example.com",
        "categories_id": 2040,
        "filename": "",
        "add_date": "2024-01-01 00:00:00",
        "post_date": "2024-01-01 00:00:00"
    })
}

#[tokio::test]
async fn indexed_release_is_found_by_search() {
    let (index, _engine) = start_fake().await;
    index
        .index_document(Namespace::Releases, 7, &release(7, "Coraline.2009.1080p.BluRay"))
        .await
        .unwrap();
    index
        .index_document(Namespace::Releases, 8, &release(8, "Other.Film.2010.720p"))
        .await
        .unwrap();

    let ids = search::release_search(&index, "coraline 2009", 100)
        .await
        .unwrap();
    assert_eq!(ids, vec![7]);
}

#[tokio::test]
async fn update_is_idempotent_and_upserts() {
    let (index, engine) = start_fake().await;
    let fields = json!({ "id": 3, "title": "Some.Movie.2010-GRP" });

    index
        .update_document(Namespace::Predb, 3, &fields)
        .await
        .unwrap();
    let first = engine.lock().unwrap().docs["predb"][&3].clone();

    index
        .update_document(Namespace::Predb, 3, &fields)
        .await
        .unwrap();
    let second = engine.lock().unwrap().docs["predb"][&3].clone();

    assert_eq!(first, second);
    assert_eq!(second["title"], "Some.Movie.2010-GRP");
}

#[tokio::test]
async fn deleting_a_missing_document_succeeds() {
    let (index, engine) = start_fake().await;
    index.delete_document(Namespace::Releases, 99).await.unwrap();

    index
        .index_document(Namespace::Releases, 1, &release(1, "A.Film.2001"))
        .await
        .unwrap();
    index.delete_document(Namespace::Releases, 1).await.unwrap();
    assert!(engine.lock().unwrap().docs["releases"].is_empty());
}

#[tokio::test]
async fn malformed_query_yields_empty_result_everywhere() {
    let (index, engine) = start_fake().await;
    index
        .index_document(Namespace::Releases, 1, &release(1, "malformed.Film.2001"))
        .await
        .unwrap();

    assert!(search::release_search(&index, "malformed", 10)
        .await
        .unwrap()
        .is_empty());
    assert!(search::release_title_search(&index, "malformed", 10)
        .await
        .unwrap()
        .is_empty());
    assert!(search::predb_title_search(&index, "malformed")
        .await
        .unwrap()
        .is_empty());
    assert!(search::predb_full_search(&index, "malformed")
        .await
        .unwrap()
        .is_empty());
    // A rejected query never opens a cursor.
    assert!(engine.lock().unwrap().scrolls.is_empty());
}

#[tokio::test]
async fn search_drains_every_scroll_page_and_releases_cursor() {
    let (index, engine) = start_fake().await;
    for id in 1..=5 {
        index
            .index_document(
                Namespace::Releases,
                id,
                &release(id, &format!("Batch.Film.Part{}.2012", id)),
            )
            .await
            .unwrap();
    }

    let mut ids = search::release_search(&index, "batch", 2).await.unwrap();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let engine = engine.lock().unwrap();
    assert_eq!(engine.cleared, vec!["scroll-1".to_string()]);
    assert!(engine.scrolls.is_empty());
}

#[tokio::test]
async fn abandoned_cursor_is_released_on_drop() {
    let (index, engine) = start_fake().await;
    for id in 1..=4 {
        index
            .index_document(Namespace::Predb, id, &json!({ "id": id, "title": "Drop.Test" }))
            .await
            .unwrap();
    }

    let request = SearchRequest::new("drop", &["title"], 2);
    let mut cursor = index.open_scroll(Namespace::Predb, &request).await.unwrap();
    assert_eq!(cursor.next_batch().await.unwrap().len(), 2);
    assert!(!cursor.is_released());
    drop(cursor);

    for _ in 0..50 {
        if !engine.lock().unwrap().cleared.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(engine.lock().unwrap().cleared, vec!["scroll-1".to_string()]);
}

#[tokio::test]
async fn failed_page_releases_cursor() {
    let (index, engine) = start_fake().await;
    for id in 1..=3 {
        index
            .index_document(Namespace::Predb, id, &json!({ "id": id, "title": "Fail.Test" }))
            .await
            .unwrap();
    }

    let request = SearchRequest::new("fail", &["title"], 1);
    let mut cursor = index.open_scroll(Namespace::Predb, &request).await.unwrap();
    assert_eq!(cursor.next_batch().await.unwrap().len(), 1);

    engine.lock().unwrap().fail_scroll_pages = true;
    assert!(cursor.next_batch().await.is_err());
    assert!(cursor.is_released());
    assert_eq!(engine.lock().unwrap().cleared, vec!["scroll-1".to_string()]);
}
