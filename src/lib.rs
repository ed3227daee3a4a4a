//! HR-DSS edge gateway.
//!
//! A small reverse proxy that fronts the HR-DSS backend: it answers CORS
//! preflights locally, gates traffic through an optional rate limiter,
//! forwards `/api/*` requests to the configured backend origin with
//! zero-copy body streaming, decorates responses with CORS and security
//! headers, and records access logs off the response path.
//!
//! # Request flow
//!
//! ```text
//! Request ──► router::resolve()
//!     │
//!     ├─ OPTIONS *          ──► 204 + CORS headers (backend never contacted)
//!     ├─ GET /health        ──► local liveness JSON
//!     ├─ GET /api           ──► capability descriptor JSON
//!     ├─ * /api/*           ──► rate-limit gate ──► forward ──► decorate
//!     │                              │                              │
//!     │                            429                    (detached) access log
//!     └─ everything else    ──► 404 JSON
//! ```

pub mod access_log;
pub mod client_ip;
pub mod config;
pub mod cors;
pub mod endpoints;
pub mod error;
pub mod rate_limit;
pub mod request_id;
pub mod response;
pub mod router;
pub mod security;
pub mod server;
pub mod service;
