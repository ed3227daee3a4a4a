//! CORS policy: origin resolution, response headers and preflight handling.

use http::{HeaderMap, HeaderValue, Response, StatusCode};

use crate::response::{self, GatewayBody};

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Request-ID";
const MAX_AGE: &str = "86400";

/// The configured CORS allow-list, in declaration order.
///
/// Resolution echoes a recognized `Origin` back exactly; any other origin
/// falls back to the **first** configured entry rather than being denied.
/// That fallback is intentionally preserved behavior: unknown origins are
/// granted the first origin's permissions instead of receiving no CORS
/// headers at all.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    /// Parse a comma-separated allow-list, trimming whitespace and
    /// dropping empty entries.
    pub fn from_allowlist(list: &str) -> Self {
        Self {
            origins: list
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        }
    }

    /// Resolve the `Access-Control-Allow-Origin` value for a request origin.
    pub fn resolve(&self, origin: &str) -> &str {
        self.origins
            .iter()
            .find(|allowed| *allowed == origin)
            .or_else(|| self.origins.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overlay the full CORS header set onto a response.
    pub fn apply(&self, headers: &mut HeaderMap, origin: &str) {
        let allow_origin = HeaderValue::from_str(self.resolve(origin))
            .unwrap_or_else(|_| HeaderValue::from_static(""));
        headers.insert("access-control-allow-origin", allow_origin);
        headers.insert(
            "access-control-allow-methods",
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert("access-control-max-age", HeaderValue::from_static(MAX_AGE));
        headers.insert(
            "access-control-allow-credentials",
            HeaderValue::from_static("true"),
        );
    }

    /// Answer a preflight request: 204, empty body, CORS headers only.
    ///
    /// Preflights never reach the backend.
    pub fn preflight(&self, origin: &str) -> Response<GatewayBody> {
        let mut resp = Response::new(response::empty());
        *resp.status_mut() = StatusCode::NO_CONTENT;
        self.apply(resp.headers_mut(), origin);
        resp
    }
}
