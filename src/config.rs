//! Gateway configuration from environment variables.

use std::time::Duration;

use tracing::warn;

use crate::error::{GatewayError, GatewayResult};

/// Default CORS allow-list when `ALLOWED_ORIGINS` is unset (local dashboard dev).
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Access-log verbosity, from `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Failures only.
    #[default]
    Info,
    /// Failures only, successes suppressed entirely.
    Warn,
    /// Everything, successes at info severity.
    Debug,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

/// Runtime configuration for the gateway.
///
/// # Environment variables
///
/// | Name | Effect | Default |
/// |------|--------|---------|
/// | `BACKEND_URL` | origin `/api/*` is proxied to | required |
/// | `ENVIRONMENT` | tag on logs and the `/api` descriptor | `development` |
/// | `ALLOWED_ORIGINS` | comma-separated CORS allow-list | `http://localhost:3000` |
/// | `LOG_LEVEL` | `info` \| `warn` \| `debug` | `info` |
/// | `GATEWAY_BACKEND_TIMEOUT_SECS` | optional bound on the backend call | unset (no timeout) |
///
/// The backend call runs without a deadline unless
/// `GATEWAY_BACKEND_TIMEOUT_SECS` is set; when it is, expiry resolves into
/// the same 502 path as any other backend failure.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Deployment environment tag (`development`, `staging`, `production`).
    pub environment: String,
    /// Backend origin, e.g. `https://backend.internal:8080`.
    pub backend_url: String,
    /// Comma-separated CORS allow-list.
    pub allowed_origins: String,
    /// Access-log verbosity.
    pub log_level: LogLevel,
    /// Optional bound on the outbound backend call.
    pub backend_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingConfig`] when `BACKEND_URL` is absent;
    /// every other value falls back to a default with a logged warning.
    pub fn from_env() -> GatewayResult<Self> {
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|_| GatewayError::MissingConfig("BACKEND_URL"))?;

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| {
            warn!(
                default = DEFAULT_ALLOWED_ORIGINS,
                "ALLOWED_ORIGINS not set, using default"
            );
            DEFAULT_ALLOWED_ORIGINS.to_string()
        });

        let log_level = match std::env::var("LOG_LEVEL") {
            Ok(value) => LogLevel::parse(&value).unwrap_or_else(|| {
                warn!(
                    env_var = "LOG_LEVEL",
                    value = %value,
                    "Invalid value for environment variable, using default"
                );
                LogLevel::default()
            }),
            Err(_) => LogLevel::default(),
        };

        let backend_timeout = match std::env::var("GATEWAY_BACKEND_TIMEOUT_SECS") {
            Ok(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    warn!(
                        env_var = "GATEWAY_BACKEND_TIMEOUT_SECS",
                        value = %value,
                        "Invalid value for environment variable, timeout disabled"
                    );
                    None
                }
            },
            Err(_) => None,
        };

        Ok(Self {
            environment,
            backend_url,
            allowed_origins,
            log_level,
            backend_timeout,
        })
    }
}

/// Parse an environment variable with a warning on invalid values.
///
/// If the variable is set but cannot be parsed, logs a warning and returns
/// the default. If it is not set, returns the default silently.
pub(crate) fn parse_env_warn<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(val) => match val.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    env_var = name,
                    value = %val,
                    default = %default,
                    "Invalid value for environment variable, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
