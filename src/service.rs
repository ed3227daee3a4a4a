//! The gateway service.
//!
//! One instance handles every request in processing order: route dispatch,
//! CORS preflight, rate-limit gate, backend forwarding, response
//! decoration, and the detached access log. Instances are cheap to clone
//! and share the upstream client's connection pool; there is no mutable
//! state between requests.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderValue, Method, Request, Response, StatusCode, Uri, header};
use http_body_util::{BodyExt, BodyStream, Empty, StreamBody};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use tokio_util::task::TaskTracker;
use tower::Service;
use tracing::{debug, warn};

use crate::access_log::{self, AccessLogEntry};
use crate::client_ip;
use crate::config::GatewayConfig;
use crate::cors::CorsPolicy;
use crate::endpoints;
use crate::error::{GatewayError, GatewayResult};
use crate::rate_limit::RateLimit;
use crate::request_id::{RequestId, X_REQUEST_ID};
use crate::response::{self, GatewayBody};
use crate::router::{self, Route};
use crate::security;

/// Body type for requests sent to the backend.
type OutboundBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Stateless request handler fronting the backend origin.
#[derive(Clone)]
pub struct Gateway {
    /// HTTPS-capable pooled client for backend connections.
    client: Client<HttpsConnector<HttpConnector>, OutboundBody>,
    config: Arc<GatewayConfig>,
    cors: CorsPolicy,
    /// Optional rate-limiting capability; absent means fail-open.
    limiter: Option<Arc<dyn RateLimit>>,
    /// Tracks detached access-log tasks so shutdown can wait for them.
    log_tasks: TaskTracker,
}

impl Gateway {
    /// Create a gateway from its configuration and optional rate limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS crypto provider cannot be installed or
    /// the native root certificates cannot be loaded.
    pub fn new(
        config: Arc<GatewayConfig>,
        limiter: Option<Arc<dyn RateLimit>>,
    ) -> GatewayResult<Self> {
        // Install the default crypto provider exactly once; later gateways
        // (tests spawn several) reuse the captured result.
        static RUSTLS_INIT: std::sync::OnceLock<Result<(), ()>> = std::sync::OnceLock::new();
        let init_result = RUSTLS_INIT.get_or_init(|| {
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| ())
        });
        if init_result.is_err() {
            return Err(GatewayError::Upstream(
                "failed to install rustls crypto provider".to_string(),
            ));
        }

        let mut http_connector = HttpConnector::new();
        http_connector.set_nodelay(true);

        let https_connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| GatewayError::Upstream(format!("failed to load native TLS roots: {e}")))?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build(https_connector);

        let cors = CorsPolicy::from_allowlist(&config.allowed_origins);

        Ok(Self {
            client,
            config,
            cors,
            limiter,
            log_tasks: TaskTracker::new(),
        })
    }

    /// Whether a rate-limiting capability is wired.
    pub fn is_rate_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Tracker for detached access-log tasks.
    ///
    /// Close and await it after the accept loop exits so pending entries
    /// reach the sink before the process ends.
    pub fn log_tasks(&self) -> &TaskTracker {
        &self.log_tasks
    }

    /// Handle one inbound request. Never fails: every failure is resolved
    /// into a client-visible response here or below.
    pub async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        let request_id = RequestId::generate();
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match router::resolve(req.method(), req.uri().path()) {
            Route::Preflight => self.cors.preflight(&origin),
            Route::Health => endpoints::health(&request_id),
            Route::ApiDescriptor => {
                endpoints::api_descriptor(&self.config.environment, &request_id)
            }
            Route::Proxy => self.proxy(req, request_id, &origin).await,
            Route::NotFound => endpoints::not_found(&request_id),
        }
    }

    /// The `/api/*` path: rate-limit gate, forward, decorate, log.
    ///
    /// This is the single catch boundary for the forwarding path; any
    /// failure below resolves into the 502 response.
    async fn proxy(
        &self,
        req: Request<Incoming>,
        request_id: RequestId,
        origin: &str,
    ) -> Response<GatewayBody> {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let client_ip = client_ip::resolve(req.headers());

        if let Some(limiter) = &self.limiter {
            if !limiter.allow(&client_ip).await {
                warn!(request_id = %request_id, client_ip = %client_ip, "Rate limit exceeded");
                return self.rate_limited(&request_id, origin);
            }
        }

        match self.forward(req, &request_id, &client_ip).await {
            Ok(backend_resp) => {
                let resp = self.decorate(backend_resp, &request_id, origin);
                self.schedule_access_log(AccessLogEntry {
                    request_id: request_id.to_string(),
                    method: method.to_string(),
                    path,
                    status: resp.status().as_u16(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    client_ip,
                    error: None,
                });
                resp
            }
            Err(err) => {
                self.schedule_access_log(AccessLogEntry {
                    request_id: request_id.to_string(),
                    method: method.to_string(),
                    path,
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    client_ip,
                    error: Some(err.to_string()),
                });
                err.to_response(&request_id)
            }
        }
    }

    /// Send the request to the backend origin.
    ///
    /// The inbound path and query are appended to the backend URL
    /// verbatim. Headers are cloned, then the forwarding set is applied:
    /// `X-Request-ID`, `X-Forwarded-For` (overwritten, not appended),
    /// `X-Forwarded-Proto: https`, and `Host` removed so the client
    /// supplies the backend's own authority. Bodies stream through without
    /// buffering; GET/HEAD send none. One attempt, no retries.
    async fn forward(
        &self,
        req: Request<Incoming>,
        request_id: &RequestId,
        client_ip: &str,
    ) -> GatewayResult<Response<Incoming>> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = backend_uri(&self.config.backend_url, path_and_query)?;

        debug!(method = %req.method(), target = %target, "Forwarding to backend");

        let (parts, body) = req.into_parts();

        let mut builder = Request::builder().method(parts.method.clone()).uri(&target);
        let headers = builder
            .headers_mut()
            .ok_or_else(|| GatewayError::Upstream("request builder in invalid state".to_string()))?;
        *headers = parts.headers;
        headers.insert(X_REQUEST_ID, request_id.header_value());
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(client_ip)
                .unwrap_or_else(|_| HeaderValue::from_static(client_ip::UNKNOWN)),
        );
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.remove(header::HOST);

        let outbound_body: OutboundBody =
            if parts.method == Method::GET || parts.method == Method::HEAD {
                // No body per HTTP semantics.
                BodyExt::boxed(Empty::<Bytes>::new().map_err(|e| match e {}))
            } else {
                let stream = BodyStream::new(body).map(|result| {
                    result.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                        Box::new(std::io::Error::other(format!("body stream error: {e}")))
                    })
                });
                BodyExt::boxed(StreamBody::new(stream))
            };

        let outbound = builder
            .body(outbound_body)
            .map_err(|e| GatewayError::Upstream(format!("failed to build backend request: {e}")))?;

        let pending = self.client.request(outbound);
        match self.config.backend_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| GatewayError::BackendTimeout(timeout.as_secs()))?
                .map_err(|e| GatewayError::Upstream(e.to_string())),
            None => pending.await.map_err(|e| GatewayError::Upstream(e.to_string())),
        }
    }

    /// Overlay CORS, security and correlation headers onto the backend
    /// response. The body streams through untouched.
    fn decorate(
        &self,
        resp: Response<Incoming>,
        request_id: &RequestId,
        origin: &str,
    ) -> Response<GatewayBody> {
        let (mut parts, body) = resp.into_parts();

        self.cors.apply(&mut parts.headers, origin);
        security::apply(&mut parts.headers);
        parts.headers.insert(X_REQUEST_ID, request_id.header_value());

        let stream = BodyStream::new(body)
            .map(|result| result.map_err(|e| GatewayError::Body(e.to_string())));
        Response::from_parts(parts, BodyExt::boxed(StreamBody::new(stream)))
    }

    /// The 429 short-circuit. The backend is never contacted and no access
    /// log entry is produced for rejected requests.
    fn rate_limited(&self, request_id: &RequestId, origin: &str) -> Response<GatewayBody> {
        let mut resp = response::json(
            StatusCode::TOO_MANY_REQUESTS,
            &json!({
                "error": "Too Many Requests",
                "message": "Request limit exceeded. Please retry shortly.",
                "requestId": request_id.as_str(),
            }),
        );
        resp.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        self.cors.apply(resp.headers_mut(), origin);
        security::apply(resp.headers_mut());
        resp.headers_mut()
            .insert(X_REQUEST_ID, request_id.header_value());
        resp
    }

    /// Dispatch the access log entry off the response path.
    fn schedule_access_log(&self, entry: AccessLogEntry) {
        let level = self.config.log_level;
        let environment = self.config.environment.clone();
        self.log_tasks.spawn(async move {
            access_log::emit(&entry, level, &environment);
        });
    }
}

/// Join the backend origin with an inbound path-and-query, verbatim.
fn backend_uri(backend_url: &str, path_and_query: &str) -> GatewayResult<Uri> {
    format!("{}{}", backend_url.trim_end_matches('/'), path_and_query)
        .parse()
        .map_err(|e| GatewayError::InvalidUri(format!("{e}")))
}

impl Service<Request<Incoming>> for Gateway {
    type Response = Response<GatewayBody>;
    type Error = std::convert::Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}
