//! In-process stand-in for Readarr, shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::ReadarrConfig;
use crate::readarr::ReadarrClient;

struct MockState {
    library: Value,
    lookup: Value,
    details: Value,
    added: Vec<Value>,
    lookup_calls: usize,
    last_lookup_term: Option<String>,
    last_api_key: Option<String>,
    fail_status: Option<u16>,
    reject_add: Option<(u16, String)>,
    delay: Option<Duration>,
}

type Shared = Arc<Mutex<MockState>>;

/// A fake Readarr listening on an ephemeral localhost port.
pub struct MockReadarr {
    base_url: String,
    state: Shared,
}

impl MockReadarr {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            library: json!([]),
            lookup: json!([]),
            details: Value::Null,
            added: Vec::new(),
            lookup_calls: 0,
            last_lookup_term: None,
            last_api_key: None,
            fail_status: None,
            reject_add: None,
            delay: None,
        }));

        let app = Router::new()
            .route("/api/v1/book", get(library).post(add_book))
            .route("/api/v1/book/lookup", get(lookup))
            .route("/api/v1/book/lookup/goodreads", get(details))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api/v1", addr),
            state,
        }
    }

    pub fn config(&self) -> ReadarrConfig {
        ReadarrConfig {
            url: self.base_url.clone(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    pub fn client(&self) -> ReadarrClient {
        ReadarrClient::new(self.config()).unwrap()
    }

    pub fn set_library(&self, library: Value) {
        self.state.lock().unwrap().library = library;
    }

    pub fn set_lookup(&self, results: Value) {
        self.state.lock().unwrap().lookup = results;
    }

    pub fn set_details(&self, details: Value) {
        self.state.lock().unwrap().details = details;
    }

    /// Every endpoint answers with `status` until [`recover`](Self::recover).
    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().fail_status = Some(status);
    }

    pub fn recover(&self) {
        self.state.lock().unwrap().fail_status = None;
    }

    pub fn reject_adds(&self, status: u16, body: &str) {
        self.state.lock().unwrap().reject_add = Some((status, body.to_string()));
    }

    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Bodies received on `POST /book`, oldest first.
    pub fn added(&self) -> Vec<Value> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn lookup_calls(&self) -> usize {
        self.state.lock().unwrap().lookup_calls
    }

    pub fn last_lookup_term(&self) -> Option<String> {
        self.state.lock().unwrap().last_lookup_term.clone()
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.state.lock().unwrap().last_api_key.clone()
    }
}

/// Record the caller and return the configured delay and failure.
fn observe(state: &Shared, headers: &HeaderMap) -> (Option<Duration>, Option<u16>) {
    let mut s = state.lock().unwrap();
    s.last_api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (s.delay, s.fail_status)
}

async fn respond(
    delay: Option<Duration>,
    fail: Option<u16>,
    ok: impl FnOnce() -> Response,
) -> Response {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match fail {
        Some(code) => (StatusCode::from_u16(code).unwrap(), "upstream failure").into_response(),
        None => ok(),
    }
}

async fn library(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let (delay, fail) = observe(&state, &headers);
    let body = state.lock().unwrap().library.clone();
    respond(delay, fail, || Json(body).into_response()).await
}

async fn lookup(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (delay, fail) = observe(&state, &headers);
    let body = {
        let mut s = state.lock().unwrap();
        s.lookup_calls += 1;
        s.last_lookup_term = params.get("term").cloned();
        s.lookup.clone()
    };
    respond(delay, fail, || Json(body).into_response()).await
}

async fn details(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let (delay, fail) = observe(&state, &headers);
    let body = state.lock().unwrap().details.clone();
    respond(delay, fail, || Json(body).into_response()).await
}

async fn add_book(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let (delay, fail) = observe(&state, &headers);
    let rejection = {
        let mut s = state.lock().unwrap();
        match s.reject_add.clone() {
            Some(rejection) => Some(rejection),
            None if fail.is_none() => {
                s.added.push(body.clone());
                None
            }
            None => None,
        }
    };

    respond(delay, fail, move || match rejection {
        Some((status, text)) => (StatusCode::from_u16(status).unwrap(), text).into_response(),
        None => (StatusCode::CREATED, Json(body)).into_response(),
    })
    .await
}
