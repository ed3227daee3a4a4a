//! Configurable mock backend for gateway integration tests.
//!
//! Records every request it receives (method, path, headers, body) and
//! answers with a preconfigured status, body and optional delay.
//!
//! Note: Some methods are provided for future test expansion and may not
//! be used yet. They are marked with `#[allow(dead_code)]`.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Response, StatusCode, Uri};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// One request as observed by the backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path_and_query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock backend builder.
#[derive(Debug, Clone)]
pub struct MockBackend {
    status: StatusCode,
    body: Value,
    delay: Option<Duration>,
    response_headers: Vec<(String, String)>,
}

/// Shared state for the running mock server.
struct MockState {
    status: StatusCode,
    body: Value,
    delay: Option<Duration>,
    response_headers: Vec<(String, String)>,
    requests: RwLock<Vec<RecordedRequest>>,
}

impl MockBackend {
    /// A backend answering 200 with a small JSON body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({"ok": true}),
            delay: None,
            response_headers: Vec::new(),
        }
    }

    /// Answer with the given status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Answer with the given JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Delay every response (for timeout testing).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attach an extra response header.
    #[must_use]
    pub fn with_response_header(mut self, name: &str, value: &str) -> Self {
        self.response_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    /// Start the mock server and return its address and handle.
    pub async fn start(self) -> (SocketAddr, BackendHandle) {
        let state = Arc::new(MockState {
            status: self.status,
            body: self.body,
            delay: self.delay,
            response_headers: self.response_headers,
            requests: RwLock::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle_any)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (
            addr,
            BackendHandle {
                state,
                _handle: handle,
            },
        )
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the running mock server.
pub struct BackendHandle {
    state: Arc<MockState>,
    _handle: JoinHandle<()>,
}

impl BackendHandle {
    /// Number of requests received.
    pub async fn request_count(&self) -> usize {
        self.state.requests.read().await.len()
    }

    /// The most recent request, if any.
    pub async fn last_request(&self) -> Option<RecordedRequest> {
        self.state.requests.read().await.last().cloned()
    }
}

/// Record the request and answer with the configured response.
async fn handle_any(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path_and_query: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers: headers
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };
    state.requests.write().await.push(recorded);

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    let mut builder = Response::builder()
        .status(state.status)
        .header("content-type", "application/json");
    for (name, value) in &state.response_headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(state.body.to_string()))
        .unwrap()
}
