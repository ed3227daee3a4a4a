//! Error types for the gateway.

use http::{Response, StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::request_id::{RequestId, X_REQUEST_ID};
use crate::response::{self, GatewayBody};
use crate::security;

/// Errors that can occur while handling a request.
///
/// Everything raised on the forwarding path is caught at the proxy
/// boundary and resolved into a 502 response; the distinguishing detail
/// travels in the access log entry, not the client-visible body.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required configuration value is absent.
    #[error("missing required environment variable {0}")]
    MissingConfig(&'static str),

    /// The backend URL plus the request path did not form a valid URI.
    #[error("invalid backend URI: {0}")]
    InvalidUri(String),

    /// The outbound call to the backend failed (connect, DNS, reset).
    #[error("backend request failed: {0}")]
    Upstream(String),

    /// The optional backend timeout elapsed before a response arrived.
    #[error("backend request timed out after {0}s")]
    BackendTimeout(u64),

    /// A body stream broke mid-transfer.
    #[error("body stream error: {0}")]
    Body(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Convert a forwarding failure into the client-visible 502 response.
    ///
    /// Carries the fixed JSON shape, security headers and the correlation
    /// identifier. CORS headers are deliberately absent here, matching the
    /// longstanding behavior of the error paths (see the integration tests
    /// that pin this asymmetry down).
    pub fn to_response(&self, request_id: &RequestId) -> Response<GatewayBody> {
        let mut resp = response::json(
            StatusCode::BAD_GATEWAY,
            &json!({
                "error": "Bad Gateway",
                "message": "Unable to reach the backend service.",
                "requestId": request_id.as_str(),
            }),
        );
        security::apply(resp.headers_mut());
        resp.headers_mut()
            .insert(X_REQUEST_ID, request_id.header_value());
        resp
    }
}
