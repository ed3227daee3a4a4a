//! Access logging, decoupled from the response path.
//!
//! One entry is produced per proxied request after its response is
//! determined, then emitted by a detached task so the client-visible
//! response is never delayed. The service tracks those tasks so they
//! finish before process teardown.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::config::LogLevel;

/// One access log record.
///
/// `timestamp` and `environment` are attached at emission time.
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Emission severity after level filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Info,
}

/// Decide whether and at what severity an entry is emitted.
///
/// Rules, in order:
/// 1. at `warn`, successful requests (status < 400) are suppressed entirely;
/// 2. an attached error or a status >= 400 emits at error severity;
/// 3. at `debug`, everything else emits at info severity;
/// 4. otherwise nothing is emitted.
pub fn severity_for(level: LogLevel, status: u16, has_error: bool) -> Option<Severity> {
    if level == LogLevel::Warn && status < 400 {
        return None;
    }
    if has_error || status >= 400 {
        return Some(Severity::Error);
    }
    if level == LogLevel::Debug {
        return Some(Severity::Info);
    }
    None
}

/// Emit an entry to the console sink.
pub fn emit(entry: &AccessLogEntry, level: LogLevel, environment: &str) {
    let Some(severity) = severity_for(level, entry.status, entry.error.is_some()) else {
        return;
    };
    let timestamp = Utc::now().to_rfc3339();

    match severity {
        Severity::Error => error!(
            request_id = %entry.request_id,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            duration_ms = entry.duration_ms,
            client_ip = %entry.client_ip,
            environment = %environment,
            timestamp = %timestamp,
            error = entry.error.as_deref().unwrap_or_default(),
            "access"
        ),
        Severity::Info => info!(
            request_id = %entry.request_id,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            duration_ms = entry.duration_ms,
            client_ip = %entry.client_ip,
            environment = %environment,
            timestamp = %timestamp,
            "access"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_suppresses_successes() {
        assert_eq!(severity_for(LogLevel::Warn, 200, false), None);
        assert_eq!(severity_for(LogLevel::Warn, 304, false), None);
    }

    #[test]
    fn test_warn_still_emits_failures() {
        assert_eq!(severity_for(LogLevel::Warn, 502, false), Some(Severity::Error));
        assert_eq!(severity_for(LogLevel::Warn, 404, false), Some(Severity::Error));
    }

    #[test]
    fn test_failures_emit_at_error() {
        assert_eq!(severity_for(LogLevel::Info, 500, false), Some(Severity::Error));
        assert_eq!(severity_for(LogLevel::Debug, 400, false), Some(Severity::Error));
        assert_eq!(severity_for(LogLevel::Info, 200, true), Some(Severity::Error));
    }

    #[test]
    fn test_debug_emits_successes_at_info() {
        assert_eq!(severity_for(LogLevel::Debug, 200, false), Some(Severity::Info));
        assert_eq!(severity_for(LogLevel::Debug, 201, false), Some(Severity::Info));
    }

    #[test]
    fn test_info_emits_nothing_for_successes() {
        assert_eq!(severity_for(LogLevel::Info, 200, false), None);
    }

    #[test]
    fn test_entry_serialization_skips_absent_error() {
        let entry = AccessLogEntry {
            request_id: "req_1700000000000_ab12cd3".to_string(),
            method: "GET".to_string(),
            path: "/api/v1/decisions".to_string(),
            status: 200,
            duration_ms: 12,
            client_ip: "203.0.113.9".to_string(),
            error: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["status"], 200);
    }

    #[test]
    fn test_entry_serialization_includes_error() {
        let entry = AccessLogEntry {
            request_id: "req_1700000000000_ab12cd3".to_string(),
            method: "POST".to_string(),
            path: "/api/v1/agents".to_string(),
            status: 502,
            duration_ms: 45,
            client_ip: "unknown".to_string(),
            error: Some("backend request failed: connection refused".to_string()),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value["error"],
            "backend request failed: connection refused"
        );
    }
}
