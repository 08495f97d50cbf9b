use crate::config::RateLimitConfig;
use crate::domain::rate_limit::RateLimitKey;
use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Shared counter/block storage. Implementations must make `increment` atomic.
#[async_trait]
pub trait RateLimitStore: Send + Sync + Debug {
    /// Increments `key` and returns the new count. The first increment of an
    /// empty window sets its expiry to `now + window`; later ones leave it alone.
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64>;

    /// Current count, zero when the window has lapsed.
    async fn attempts(&self, key: &str) -> anyhow::Result<u64>;

    /// Writes a block record that expires after `duration`.
    async fn set_block(&self, key: &str, reason: &str, duration: Duration) -> anyhow::Result<()>;

    /// Remaining block time, `None` when no block record exists.
    async fn block_remaining(&self, key: &str) -> anyhow::Result<Option<Duration>>;
}

/// Budget for one scope of one purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window: Duration,
    pub block: Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub const fn login_ip(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.login_ip_limit,
            window: Duration::from_secs(config.login_ip_window_secs),
            block: Duration::from_secs(config.login_ip_block_secs),
        }
    }

    #[must_use]
    pub const fn login_user(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.login_user_limit,
            window: Duration::from_secs(config.login_user_window_secs),
            block: Duration::from_secs(config.login_user_block_secs),
        }
    }
}

/// The abuse gate consulted before expensive or sensitive work.
///
/// Answers never carry errors: a store outage is logged and treated as "allowed".
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    /// Remaining block time for `key`, if a block record is live.
    async fn blocked_for(&self, key: &RateLimitKey) -> Option<Duration>;

    async fn is_blocked(&self, key: &RateLimitKey) -> bool {
        self.blocked_for(key).await.is_some()
    }

    /// `true` while the recorded failures are below `limit`. Does not increment.
    async fn check_limit(&self, key: &RateLimitKey, limit: u64) -> bool;

    /// Records one failed attempt in the fixed window.
    async fn increment(&self, key: &RateLimitKey, window: Duration);

    async fn block(&self, key: &RateLimitKey, duration: Duration, reason: &str);

    async fn attempts(&self, key: &RateLimitKey) -> u64;
}

#[derive(Clone, Debug)]
struct Metrics {
    decisions_total: Counter<u64>,
    store_failures_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("helpdesk-auth");
        Self {
            decisions_total: meter
                .u64_counter("rate_limit_decisions_total")
                .with_description("Rate limit decisions (allowed/limited/blocked)")
                .build(),
            store_failures_total: meter
                .u64_counter("rate_limit_store_failures_total")
                .with_description("Rate limit store errors that were failed open")
                .build(),
        }
    }

    fn decision(&self, key: &RateLimitKey, label: &'static str) {
        self.decisions_total.add(1, &[KeyValue::new("scope", key.scope.as_str()), KeyValue::new("decision", label)]);
    }
}

/// Store-backed limiter.
#[derive(Clone, Debug)]
pub struct RateLimitService {
    store: Arc<dyn RateLimitStore>,
    metrics: Metrics,
}

impl RateLimitService {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store, metrics: Metrics::new() }
    }

    fn fail_open(&self, op: &'static str, key: &RateLimitKey, error: &anyhow::Error) {
        tracing::warn!(error = ?error, key = %key, op, "Rate limit store unavailable, failing open");
        self.metrics.store_failures_total.add(1, &[KeyValue::new("op", op)]);
    }
}

#[async_trait]
impl RateLimiter for RateLimitService {
    async fn blocked_for(&self, key: &RateLimitKey) -> Option<Duration> {
        match self.store.block_remaining(&key.block_key()).await {
            Ok(Some(remaining)) => {
                self.metrics.decision(key, "blocked");
                Some(remaining)
            }
            Ok(None) => None,
            Err(e) => {
                self.fail_open("block_remaining", key, &e);
                None
            }
        }
    }

    async fn check_limit(&self, key: &RateLimitKey, limit: u64) -> bool {
        let allowed = self.attempts(key).await < limit;
        self.metrics.decision(key, if allowed { "allowed" } else { "limited" });
        allowed
    }

    async fn increment(&self, key: &RateLimitKey, window: Duration) {
        match self.store.increment(&key.to_string(), window).await {
            Ok(count) => tracing::debug!(key = %key, count, "Recorded failed attempt"),
            Err(e) => self.fail_open("increment", key, &e),
        }
    }

    async fn block(&self, key: &RateLimitKey, duration: Duration, reason: &str) {
        match self.store.set_block(&key.block_key(), reason, duration).await {
            Ok(()) => tracing::warn!(key = %key, duration_secs = duration.as_secs(), reason, "Key blocked"),
            Err(e) => self.fail_open("set_block", key, &e),
        }
    }

    async fn attempts(&self, key: &RateLimitKey) -> u64 {
        match self.store.attempts(&key.to_string()).await {
            Ok(count) => count,
            Err(e) => {
                self.fail_open("attempts", key, &e);
                0
            }
        }
    }
}

/// Stand-in used when limiting is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn blocked_for(&self, _key: &RateLimitKey) -> Option<Duration> {
        None
    }

    async fn check_limit(&self, _key: &RateLimitKey, _limit: u64) -> bool {
        true
    }

    async fn increment(&self, _key: &RateLimitKey, _window: Duration) {}

    async fn block(&self, _key: &RateLimitKey, _duration: Duration, _reason: &str) {}

    async fn attempts(&self, _key: &RateLimitKey) -> u64 {
        0
    }
}
