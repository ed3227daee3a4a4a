//! Per-request correlation identifiers.
//!
//! Every inbound request gets exactly one identifier at ingress. It is
//! attached to the forwarded request, the final response, and the access
//! log entry, then discarded; nothing is persisted.

use chrono::Utc;
use http::HeaderValue;
use uuid::Uuid;

/// Header carrying the correlation identifier on requests and responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A correlation identifier of the form `req_<unix-millis>_<7 chars>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
        Self(format!("req_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as a header value.
    pub fn header_value(&self) -> HeaderValue {
        // Identifiers are generated from millis + hex, always valid ASCII.
        HeaderValue::from_str(&self.0).expect("BUG: request id is ASCII")
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
