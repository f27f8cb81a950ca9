//! In-process InfluxDB 2.x stand-in
//!
//! Serves the write, query, and bucket-listing endpoints on an ephemeral port
//! and records every request it receives so tests can assert on the wire
//! format.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use pingsink::config::StoreConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_ORG: &str = "minetrack";
pub const TEST_BUCKET: &str = "servers";

#[derive(Debug, Clone)]
pub struct CapturedWrite {
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl CapturedWrite {
    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }
}

#[derive(Debug, Clone)]
pub struct CapturedQuery {
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: serde_json::Value,
}

impl CapturedQuery {
    pub fn flux(&self) -> &str {
        self.body["query"].as_str().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MockState {
    pub writes: Mutex<Vec<CapturedWrite>>,
    pub queries: Mutex<Vec<CapturedQuery>>,
    pub bucket_lookups: Mutex<Vec<HashMap<String, String>>>,
    /// Statuses for upcoming writes; 204 once exhausted
    pub write_statuses: Mutex<VecDeque<u16>>,
    /// (status, CSV body) for upcoming queries; empty 200 once exhausted
    pub query_responses: Mutex<VecDeque<(u16, String)>>,
    pub buckets_body: Mutex<String>,
}

pub struct MockInflux {
    pub state: Arc<MockState>,
    pub url: String,
}

impl MockInflux {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        *state.buckets_body.lock() = format!(r#"{{"buckets":[{{"name":"{}"}}]}}"#, TEST_BUCKET);

        let app = Router::new()
            .route("/api/v2/write", post(write))
            .route("/api/v2/query", post(query))
            .route("/api/v2/buckets", get(buckets))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            url: format!("http://{}", addr),
        }
    }

    /// Config pointing at this mock with an explicit token.
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            url: Some(self.url.clone()),
            org: Some(TEST_ORG.to_string()),
            bucket: Some(TEST_BUCKET.to_string()),
            token: Some(TEST_TOKEN.to_string()),
            ..Default::default()
        }
    }

    pub fn fail_next_writes(&self, statuses: &[u16]) {
        self.state.write_statuses.lock().extend(statuses);
    }

    pub fn respond_to_query(&self, status: u16, csv: &str) {
        self.state
            .query_responses
            .lock()
            .push_back((status, csv.to_string()));
    }

    pub fn set_buckets_body(&self, body: &str) {
        *self.state.buckets_body.lock() = body.to_string();
    }

    pub fn writes(&self) -> Vec<CapturedWrite> {
        self.state.writes.lock().clone()
    }

    pub fn queries(&self) -> Vec<CapturedQuery> {
        self.state.queries.lock().clone()
    }

    /// Poll until `count` writes have arrived or `timeout` passes.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> Vec<CapturedWrite> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let writes = self.writes();
            if writes.len() >= count || tokio::time::Instant::now() >= deadline {
                return writes;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn write(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.writes.lock().push(CapturedWrite {
        params,
        authorization: header_value(&headers, header::AUTHORIZATION),
        content_type: header_value(&headers, header::CONTENT_TYPE),
        body,
    });

    match state.write_statuses.lock().pop_front() {
        Some(code) => (status(code), r#"{"code":"internal error"}"#.to_string()),
        None => (StatusCode::NO_CONTENT, String::new()),
    }
}

async fn query(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    state.queries.lock().push(CapturedQuery {
        params,
        authorization: header_value(&headers, header::AUTHORIZATION),
        accept: header_value(&headers, header::ACCEPT),
        body,
    });

    let (code, csv) = state
        .query_responses
        .lock()
        .pop_front()
        .unwrap_or((200, String::new()));
    (status(code), [(header::CONTENT_TYPE, "text/csv")], csv)
}

async fn buckets(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.bucket_lookups.lock().push(params);
    (StatusCode::OK, state.buckets_body.lock().clone())
}
