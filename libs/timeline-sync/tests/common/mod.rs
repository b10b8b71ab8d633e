//! Shared fixtures for timeline-sync integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use timeline_sync::ports::{MemoryPreferences, StaticCapabilities, StatusLookup, Transport};
use timeline_sync::{ApiRequest, ApiResponse, EngineConfig, HttpError, Method, TimelineEngine};
use tokio::sync::Semaphore;

mock! {
    pub Lookup {}

    #[async_trait]
    impl StatusLookup for Lookup {
        async fn resolve_remote_status(&self, uri: &str) -> Result<Option<String>, HttpError>;
    }
}

/// In-memory transport answering from per-route queues.
///
/// Routes are `"METHOD path"`. An exhausted route answers `[]` for GET and
/// `{}` otherwise. Gated routes block until [`ScriptedTransport::release`].
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<ApiResponse, HttpError>>>>,
    requests: Mutex<Vec<ApiRequest>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

fn route(method: Method, path: &str) -> String {
    format!("{} {}", method.as_str(), path)
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, response: ApiResponse) {
        self.routes
            .lock()
            .entry(route(method, path))
            .or_default()
            .push_back(Ok(response));
    }

    pub fn fail(&self, method: Method, path: &str, error: HttpError) {
        self.routes
            .lock()
            .entry(route(method, path))
            .or_default()
            .push_back(Err(error));
    }

    /// Hold every request to `path` until released
    pub fn gate(&self, method: Method, path: &str) {
        self.gates
            .lock()
            .insert(route(method, path), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, method: Method, path: &str, count: usize) {
        if let Some(gate) = self.gates.lock().get(&route(method, path)) {
            gate.add_permits(count);
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let key = route(request.method, &request.path);
        self.requests.lock().push(request.clone());

        let gate = self.gates.lock().get(&key).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| HttpError::network(e.to_string()))?
                .forget();
        }

        let next = self
            .routes
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(response) => response,
            None if request.method == Method::Get => Ok(ApiResponse::new(json!([]))),
            None => Ok(ApiResponse::new(json!({}))),
        }
    }
}

pub fn status(id: &str) -> Value {
    json!({
        "id": id,
        "uri": format!("https://home.example/statuses/{}", id),
        "account": {"id": "acc-1", "acct": "alice"},
        "content": format!("<p>{}</p>", id)
    })
}

pub fn statuses(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| status(id)).collect())
}

pub fn engine_with(transport: Arc<ScriptedTransport>, lookup: Arc<dyn StatusLookup>) -> TimelineEngine {
    TimelineEngine::new(
        transport,
        Arc::new(StaticCapabilities::default()),
        Arc::new(MemoryPreferences::new()),
        lookup,
        EngineConfig::default(),
    )
}

pub fn engine(transport: Arc<ScriptedTransport>) -> TimelineEngine {
    engine_with(transport, Arc::new(timeline_sync::ports::NoLookup))
}

pub fn ids(engine: &TimelineEngine, key: &timeline_sync::FeedKey) -> Vec<String> {
    engine
        .cache()
        .items(key)
        .iter()
        .map(|i| i.id().to_string())
        .collect()
}

/// Wait until no fetch for `key` is in flight
pub async fn settle(engine: &TimelineEngine, key: &timeline_sync::FeedKey) {
    for _ in 0..200 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        if !engine.cache().is_fetching(key) {
            return;
        }
    }
    panic!("fetch for {} never settled", key);
}
