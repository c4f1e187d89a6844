//! Shared fixtures for the HTTP-level tests.
//!
//! [`FakeEngine`] stands in for the search cluster behind the
//! [`Connection`] seam. It keeps documents per index, records every search
//! body it receives and evaluates just enough of a query to be useful:
//! the `Visible` restriction, color scoring, `from`/`size` and the work type
//! tally. Everything else in a request is checked by inspecting the recorded
//! bodies.
//!
//! Use the `app` fixture for a router wired to a fresh engine.

#![allow(dead_code)] // Helpers used across different integration test crates

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use catalogue_search::api::{self, AppState};
use catalogue_search::engine::{Connection, ConnectionFactory, EngineError, ResilientClient};
use catalogue_search::query::color::{ColorMetric, NormalizedRgb, Rgb};
use catalogue_search::query::{GetRequest, SearchRequest};
use catalogue_search::Config;
use futures::future::BoxFuture;
use rstest::fixture;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

pub const PUBLIC_ROOT: &str = "https://api.example.org/catalogue/v2";

#[derive(Default)]
pub struct FakeEngine {
    docs: Mutex<HashMap<String, Vec<(String, Value)>>>,
    aggregations: Mutex<Option<Value>>,
    searches: Mutex<Vec<SearchRequest>>,
    /// Calls left to reject with 401.
    rejections: AtomicUsize,
}

impl FakeEngine {
    pub fn insert(&self, index: &str, id: &str, source: Value) {
        self.docs
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .push((id.to_string(), source));
    }

    /// Aggregations to return with every search.
    pub fn set_aggregations(&self, aggregations: Value) {
        *self.aggregations.lock().unwrap() = Some(aggregations);
    }

    pub fn reject_next(&self, calls: usize) {
        self.rejections.store(calls, Ordering::SeqCst);
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.searches.lock().unwrap().clone()
    }

    pub fn last_search(&self) -> SearchRequest {
        self.searches().pop().expect("no search was sent")
    }

    fn check_credentials(&self) -> Result<(), EngineError> {
        let rejected = self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(EngineError::Response {
                status: 401,
                reason: "security_exception: unable to authenticate".to_string(),
            });
        }
        Ok(())
    }

    fn run_search(&self, request: &SearchRequest) -> Result<Value, EngineError> {
        self.check_credentials()?;
        self.searches.lock().unwrap().push(request.clone());

        let docs = self
            .docs
            .lock()
            .unwrap()
            .get(&request.index)
            .cloned()
            .unwrap_or_default();
        let body = &request.body;

        if body.pointer("/aggs/workTypes").is_some() {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for (_, source) in &docs {
                let kind = source["type"].as_str().unwrap_or("Visible").to_string();
                *counts.entry(kind).or_default() += 1;
            }
            let buckets: Vec<Value> = counts
                .into_iter()
                .map(|(key, count)| json!({ "key": key, "doc_count": count }))
                .collect();
            return Ok(json!({
                "hits": { "total": { "value": docs.len() }, "hits": [] },
                "aggregations": { "workTypes": { "buckets": buckets } }
            }));
        }

        let visible_only = contains(&body["query"], &json!({ "term": { "type": { "value": "Visible" } } }));
        let mut hits: Vec<(String, Value)> = docs
            .into_iter()
            .filter(|(_, source)| !visible_only || source["type"] == "Visible")
            .collect();

        if let Some(query_vector) = body
            .pointer("/query/script_score/script/params/query_vector")
            .and_then(|v| serde_json::from_value::<Vec<f64>>(v.clone()).ok())
        {
            let distance = |source: &Value| {
                let palette: Vec<f64> =
                    serde_json::from_value(source["vectorValues"]["paletteEmbedding"].clone()).unwrap_or_default();
                NormalizedRgb.distance(&query_vector, &palette)
            };
            hits.sort_by(|a, b| distance(&a.1).total_cmp(&distance(&b.1)));
        }

        let total = hits.len();
        let from = body["from"].as_u64().unwrap_or(0) as usize;
        let size = body["size"].as_u64().unwrap_or(10) as usize;
        let page: Vec<Value> = hits
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, source)| json!({ "_id": id, "_source": source }))
            .collect();

        let mut response = json!({ "hits": { "total": { "value": total, "relation": "eq" }, "hits": page } });
        if let Some(aggregations) = self.aggregations.lock().unwrap().clone() {
            response["aggregations"] = aggregations;
        }
        Ok(response)
    }

    fn run_get(&self, request: &GetRequest) -> Result<Value, EngineError> {
        self.check_credentials()?;
        let docs = self.docs.lock().unwrap();
        let found = docs
            .get(&request.index)
            .and_then(|docs| docs.iter().find(|(id, _)| *id == request.id));
        match found {
            Some((id, source)) => Ok(json!({ "_id": id, "found": true, "_source": source })),
            None => Err(EngineError::Response {
                status: 404,
                reason: json!({ "_id": request.id, "found": false }).to_string(),
            }),
        }
    }
}

/// Whether `needle` appears anywhere inside `haystack`.
fn contains(haystack: &Value, needle: &Value) -> bool {
    if haystack == needle {
        return true;
    }
    match haystack {
        Value::Array(items) => items.iter().any(|item| contains(item, needle)),
        Value::Object(map) => map.values().any(|item| contains(item, needle)),
        _ => false,
    }
}

impl Connection for FakeEngine {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        Box::pin(async move { self.run_search(request) })
    }

    fn get<'a>(&'a self, request: &'a GetRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        Box::pin(async move { self.run_get(request) })
    }

    fn cluster_health(&self) -> BoxFuture<'_, Result<Value, EngineError>> {
        Box::pin(async move {
            self.check_credentials()?;
            Ok(json!({ "cluster_name": "fake", "status": "green" }))
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Connection handle onto a shared [`FakeEngine`].
struct Handle(Arc<FakeEngine>);

impl Connection for Handle {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        self.0.search(request)
    }

    fn get<'a>(&'a self, request: &'a GetRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
        self.0.get(request)
    }

    fn cluster_health(&self) -> BoxFuture<'_, Result<Value, EngineError>> {
        self.0.cluster_health()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.0.close()
    }
}

/// Reconnects to the same engine, counting how often it is asked to.
pub struct FakeConnector {
    engine: Arc<FakeEngine>,
    pub connects: AtomicUsize,
}

impl ConnectionFactory for FakeConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Handle(self.engine.clone())) as Arc<dyn Connection>)
        })
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|value| value.to_str().ok())
    }
}

pub struct TestApp {
    pub engine: Arc<FakeEngine>,
    pub connector: Arc<FakeConnector>,
    pub config: Config,
    router: Router,
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, headers, body }
    }

    pub fn insert_work(&self, id: &str, source: Value) {
        self.engine.insert(&self.config.works_index, id, source);
    }

    pub fn insert_image(&self, id: &str, source: Value) {
        self.engine.insert(&self.config.images_index, id, source);
    }
}

#[fixture]
pub fn app() -> TestApp {
    catalogue_search::tracing::init_test();

    let engine = Arc::new(FakeEngine::default());
    let connector = Arc::new(FakeConnector {
        engine: engine.clone(),
        connects: AtomicUsize::new(0),
    });

    let mut config = Config::default();
    config.public_root_url = Url::parse(PUBLIC_ROOT).unwrap();
    config.refresh_cooldown = Duration::ZERO;

    let client = ResilientClient::new(
        Arc::new(Handle(engine.clone())),
        connector.clone(),
        config.refresh_cooldown,
    );
    let router = api::router(AppState::new(Arc::new(config.clone()), Arc::new(client)));

    TestApp {
        engine,
        connector,
        config,
        router,
    }
}

/// A visible work with every include present in its display document.
pub fn work(id: &str, title: &str) -> Value {
    json!({
        "type": "Visible",
        "display": {
            "id": id,
            "title": title,
            "type": "Work",
            "identifiers": [{ "value": format!("b{id}"), "type": "Identifier" }],
            "items": [],
            "subjects": [],
            "genres": [],
            "contributors": [],
            "production": [],
            "languages": [],
            "notes": []
        }
    })
}

pub fn redirected(target: &str) -> Value {
    json!({ "type": "Redirected", "redirectTo": target })
}

pub fn hidden(state: &str) -> Value {
    json!({ "type": state })
}

/// An image whose palette is the single color `hex`.
pub fn image(id: &str, hex: &str) -> Value {
    let rgb: Rgb = hex.parse().unwrap();
    json!({
        "display": {
            "id": id,
            "type": "Image",
            "thumbnail": { "url": format!("https://iiif.example.org/{id}/info.json") },
            "source": { "id": format!("w-{id}"), "type": "Work", "contributors": [], "languages": [] }
        },
        "vectorValues": {
            "paletteEmbedding": NormalizedRgb.embed(rgb),
            "features": [0.1, 0.2, 0.3]
        }
    })
}
