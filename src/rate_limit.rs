//! Rate limiting: the external capability seam and an in-process
//! GCRA-backed implementation.
//!
//! The gateway itself keeps no counters and no windows; it only asks a
//! [`RateLimit`] capability whether a key may proceed. When no capability
//! is wired, the gate is a no-op and traffic flows unchecked (fail-open).

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use tracing::{debug, info};

use crate::config::parse_env_warn;

/// External rate-limiting capability, keyed by client IP string.
///
/// Clients without a resolvable address all present the key `"unknown"`
/// and therefore share one bucket.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Whether a request under `key` may proceed.
    async fn allow(&self, key: &str) -> bool;
}

/// Type alias for the per-key governor rate limiter.
type KeyLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Entry in the per-key limiter map.
struct LimiterEntry {
    limiter: KeyLimiter,
    last_seen: Instant,
}

/// Configuration for [`PerKeyRateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum sustained requests per second per key.
    pub rps: u32,
    /// Maximum burst size per key.
    pub burst: u32,
    /// Duration after which an idle key entry is considered stale.
    pub stale_after: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rps: 50,
            burst: 100,
            stale_after: Duration::from_secs(300),
        }
    }
}

impl RateLimiterConfig {
    /// Load configuration from environment variables, if enabled.
    ///
    /// Returns `None` unless `GATEWAY_RATE_LIMIT_RPS` is set: an absent
    /// capability means an open gate, not a denied one.
    ///
    /// - `GATEWAY_RATE_LIMIT_RPS` (enables the limiter)
    /// - `GATEWAY_RATE_LIMIT_BURST` (default: 2x rps)
    pub fn from_env() -> Option<Self> {
        std::env::var("GATEWAY_RATE_LIMIT_RPS").ok()?;

        let default = Self::default();
        let rps = parse_env_warn("GATEWAY_RATE_LIMIT_RPS", default.rps).max(1);
        let burst = parse_env_warn("GATEWAY_RATE_LIMIT_BURST", rps.saturating_mul(2)).max(1);

        Some(Self {
            rps,
            burst,
            stale_after: default.stale_after,
        })
    }
}

/// In-process per-key rate limiter using the GCRA algorithm.
///
/// Wraps a `DashMap` of per-key governor limiters created lazily on first
/// sight of a key. Stale entries are periodically removed by a background
/// task to keep memory bounded.
pub struct PerKeyRateLimiter {
    limiters: DashMap<String, LimiterEntry>,
    quota: Quota,
    stale_after: Duration,
}

impl PerKeyRateLimiter {
    /// Create a new limiter with the given configuration.
    pub fn new(config: RateLimiterConfig) -> Self {
        let rps = NonZeroU32::new(config.rps.max(1)).expect("BUG: clamped to >= 1");
        let burst = NonZeroU32::new(config.burst.max(1)).expect("BUG: clamped to >= 1");
        let quota = Quota::per_second(rps).allow_burst(burst);

        info!(
            rps = config.rps,
            burst = config.burst,
            stale_secs = config.stale_after.as_secs(),
            "Per-key rate limiter configured"
        );

        Self {
            limiters: DashMap::new(),
            quota,
            stale_after: config.stale_after,
        }
    }

    /// Synchronous check used by the trait impl and the tests.
    pub fn check(&self, key: &str) -> bool {
        let mut entry = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| LimiterEntry {
                limiter: GovernorLimiter::direct(self.quota),
                last_seen: Instant::now(),
            });
        entry.last_seen = Instant::now();
        entry.limiter.check().is_ok()
    }

    /// Remove entries not seen within `stale_after`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_stale(&self) -> usize {
        let cutoff = Instant::now() - self.stale_after;
        let before = self.limiters.len();
        self.limiters.retain(|_, entry| entry.last_seen > cutoff);
        let removed = before - self.limiters.len();
        if removed > 0 {
            debug!(
                removed,
                remaining = self.limiters.len(),
                "Cleaned up stale rate limiter entries"
            );
        }
        removed
    }

    /// Number of currently tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.limiters.len()
    }

    /// Spawn a background task that periodically cleans up stale entries.
    ///
    /// Runs every `stale_after / 2` and stops when the token is cancelled.
    pub fn spawn_cleanup_task(self: &Arc<Self>, shutdown: tokio_util::sync::CancellationToken) {
        let limiter = Arc::clone(self);
        let interval = limiter.stale_after / 2;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // Skip immediate first tick
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        limiter.cleanup_stale();
                    }
                    _ = shutdown.cancelled() => {
                        debug!("Rate limiter cleanup task shutting down");
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl RateLimit for PerKeyRateLimiter {
    async fn allow(&self, key: &str) -> bool {
        self.check(key)
    }
}
