//! Locally answered endpoints: liveness, capability descriptor, fallback.
//!
//! None of these touch the backend. `/health` in particular must stay a
//! zero-dependency liveness check so it keeps answering while the backend
//! is down.

use chrono::Utc;
use http::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::request_id::{RequestId, X_REQUEST_ID};
use crate::response::{self, GatewayBody};
use crate::security;

/// Service identity reported by the liveness check.
pub const SERVICE_NAME: &str = "hr-dss-api-gateway";

/// Display name reported by the capability descriptor.
pub const GATEWAY_NAME: &str = "HR-DSS API Gateway";

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    service: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ApiDescriptor<'a> {
    name: &'static str,
    version: &'static str,
    environment: &'a str,
    endpoints: EndpointMap,
}

#[derive(Debug, Serialize)]
struct EndpointMap {
    health: &'static str,
    api: &'static str,
    agents: &'static str,
    decisions: &'static str,
    graph: &'static str,
}

/// `GET /health`: unconditional liveness.
pub fn health(request_id: &RequestId) -> Response<GatewayBody> {
    let body = HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Utc::now().to_rfc3339(),
    };
    finalize(response::json(StatusCode::OK, &body), request_id)
}

/// `GET /api`: static capability/version descriptor.
pub fn api_descriptor(environment: &str, request_id: &RequestId) -> Response<GatewayBody> {
    let body = ApiDescriptor {
        name: GATEWAY_NAME,
        version: env!("CARGO_PKG_VERSION"),
        environment,
        endpoints: EndpointMap {
            health: "/health",
            api: "/api/v1/*",
            agents: "/api/v1/agents/*",
            decisions: "/api/v1/decisions/*",
            graph: "/api/v1/graph/*",
        },
    };
    finalize(response::json(StatusCode::OK, &body), request_id)
}

/// Fallback for unmatched routes, any method.
pub fn not_found(request_id: &RequestId) -> Response<GatewayBody> {
    finalize(
        response::json(
            StatusCode::NOT_FOUND,
            &json!({
                "error": "Not Found",
                "message": "The requested resource does not exist.",
            }),
        ),
        request_id,
    )
}

fn finalize(mut resp: Response<GatewayBody>, request_id: &RequestId) -> Response<GatewayBody> {
    security::apply(resp.headers_mut());
    resp.headers_mut()
        .insert(X_REQUEST_ID, request_id.header_value());
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<GatewayBody>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_shape() {
        let resp = health(&RequestId::generate());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");

        let value = body_json(resp).await;
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["service"], SERVICE_NAME);
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_api_descriptor_shape() {
        let resp = api_descriptor("staging", &RequestId::generate());
        assert_eq!(resp.status(), StatusCode::OK);

        let value = body_json(resp).await;
        assert_eq!(value["name"], GATEWAY_NAME);
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["environment"], "staging");
        assert_eq!(value["endpoints"]["health"], "/health");
        assert_eq!(value["endpoints"]["agents"], "/api/v1/agents/*");
        assert_eq!(value["endpoints"]["graph"], "/api/v1/graph/*");
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let request_id = RequestId::generate();
        let resp = not_found(&request_id);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap(),
            request_id.as_str()
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
        // No CORS headers on the fallback path.
        assert!(resp.headers().get("access-control-allow-origin").is_none());

        let value = body_json(resp).await;
        assert_eq!(value["error"], "Not Found");
        assert!(value["message"].is_string());
    }
}
