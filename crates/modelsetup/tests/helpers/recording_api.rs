//! In-memory entity API that records every call.
//!
//! Entities are stored by request path, so configs in these tests use the
//! same template for create and lookup. Writes can be slowed down to observe
//! concurrency, rejected with 422 to simulate a lost create race, or failed.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modelsetup_client::{ApiError, ApiResult, ClientSessionId, EntityApi, HttpMethod, RestResponse};

/// One recorded API call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    configs: Mutex<HashMap<String, Value>>,
    store: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<Call>>,
    conflicts: Mutex<HashSet<String>>,
    failures: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    next_id: AtomicUsize,
    write_delay: Mutex<Duration>,
}

/// Clones and forks share the stored entities and the call log.
#[derive(Clone)]
pub struct RecordingApi {
    state: Arc<State>,
    session: ClientSessionId,
}

fn key(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

impl RecordingApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(State::default()),
            session: ClientSessionId::new(),
        }
    }

    /// Serve `config` at `entityConfigs/{entity_type}`.
    pub fn with_config(self, entity_type: &str, config: Value) -> Self {
        self.state
            .configs
            .lock()
            .unwrap()
            .insert(format!("entityConfigs/{entity_type}"), config);
        self
    }

    /// Pretend `entity` already exists at `path`.
    pub fn with_entity(self, path: &str, entity: Value) -> Self {
        self.state.store.lock().unwrap().insert(key(path), entity);
        self
    }

    /// Answer the first write to `path` with 422, storing the entity as if a
    /// concurrent writer had created it.
    pub fn with_conflict(self, path: &str) -> Self {
        self.state.conflicts.lock().unwrap().insert(key(path));
        self
    }

    /// Answer every write to `path` with 500.
    pub fn with_failure(self, path: &str) -> Self {
        self.state.failures.lock().unwrap().insert(key(path));
        self
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        *self.state.write_delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Write calls only, in the order they were issued.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method.is_write())
            .collect()
    }

    pub fn stored(&self, path: &str) -> Option<Value> {
        self.state.store.lock().unwrap().get(&key(path)).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, method: HttpMethod, path: &str, body: Option<&Value>) {
        self.state.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
    }

    fn with_uuid(&self, body: &Value) -> Value {
        let mut stored = body.clone();
        if stored.get("uuid").map_or(true, Value::is_null) {
            let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            stored["uuid"] = json!(format!("uuid-{id}"));
        }
        stored
    }

    async fn write(&self, method: HttpMethod, path: &str, body: &Value) -> ApiResult<Value> {
        self.record(method, path, Some(body));

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.state.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let path_key = key(path);
        if self.state.failures.lock().unwrap().contains(&path_key) {
            return Err(error(method, path, 500, "boom"));
        }
        if self.state.conflicts.lock().unwrap().remove(&path_key) {
            let winner = self.with_uuid(body);
            self.state.store.lock().unwrap().insert(path_key, winner);
            return Err(error(method, path, 422, r#"[{"messageTemplate":"err.notUnique"}]"#));
        }

        let stored = self.with_uuid(body);
        self.state
            .store
            .lock()
            .unwrap()
            .insert(path_key, stored.clone());
        Ok(stored)
    }
}

fn error(method: HttpMethod, path: &str, status: u16, body: &str) -> ApiError {
    ApiError::Http {
        method,
        uri: path.to_string(),
        response: RestResponse::new(status, Some(body.to_string()), None),
    }
}

#[async_trait]
impl EntityApi for RecordingApi {
    fn session_id(&self) -> ClientSessionId {
        self.session
    }

    fn fork(&self) -> Arc<dyn EntityApi> {
        Arc::new(self.clone())
    }

    async fn get(&self, path: &str) -> ApiResult<RestResponse> {
        self.record(HttpMethod::Get, path, None);
        let path_key = key(path);

        let found = self
            .state
            .configs
            .lock()
            .unwrap()
            .get(&path_key)
            .cloned()
            .or_else(|| self.state.store.lock().unwrap().get(&path_key).cloned());

        Ok(match found {
            Some(value) => RestResponse::new(200, Some(value.to_string()), None),
            None => RestResponse::new(404, None, None),
        })
    }

    async fn put(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.write(HttpMethod::Put, path, body).await
    }

    async fn post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.write(HttpMethod::Post, path, body).await
    }
}
