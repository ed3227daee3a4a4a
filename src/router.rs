//! Request dispatch.
//!
//! An immutable mapping from (method, path) to a handling route, evaluated
//! top-to-bottom. No framework, no per-request state.
//!
//! # Routing table
//!
//! | Method / Path        | Route          |
//! |----------------------|----------------|
//! | `OPTIONS *`          | Preflight      |
//! | `GET /health`        | Health         |
//! | `GET /api`           | ApiDescriptor  |
//! | `* /api/*`           | Proxy          |
//! | anything else        | NotFound       |

use http::Method;

/// Handling path for an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// CORS preflight, answered locally with 204.
    Preflight,
    /// Local liveness check, no backend dependency.
    Health,
    /// Static capability descriptor, never proxied.
    ApiDescriptor,
    /// Forward to the backend origin.
    Proxy,
    /// No handler matched; 404 regardless of method.
    NotFound,
}

/// Resolve the route for a method and path.
pub fn resolve(method: &Method, path: &str) -> Route {
    if method == Method::OPTIONS {
        return Route::Preflight;
    }
    if method == Method::GET && path == "/health" {
        return Route::Health;
    }
    if method == Method::GET && path == "/api" {
        return Route::ApiDescriptor;
    }
    if path.starts_with("/api/") {
        return Route::Proxy;
    }
    Route::NotFound
}
