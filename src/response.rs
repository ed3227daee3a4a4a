//! Response body plumbing shared by every handler.

use bytes::Bytes;
use http::{Response, StatusCode, header};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Serialize;

use crate::error::GatewayError;

/// Unified response body type.
///
/// Locally produced responses use buffered bodies; proxied responses use a
/// streaming body. Both are boxed so every handler returns the same type.
pub type GatewayBody = BoxBody<Bytes, GatewayError>;

/// An empty body.
pub fn empty() -> GatewayBody {
    // Empty<Bytes> has Infallible error - convert using absurd pattern
    Empty::<Bytes>::new().map_err(|e| match e {}).boxed()
}

/// A fully buffered body.
pub fn full(bytes: impl Into<Bytes>) -> GatewayBody {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

/// Build a JSON response with the given status.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<GatewayBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(bytes))
        .unwrap_or_else(|_| {
            let mut resp = Response::new(full("500 Internal Server Error"));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}
