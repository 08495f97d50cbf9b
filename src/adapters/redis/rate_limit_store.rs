use crate::adapters::redis::RedisClient;
use crate::services::rate_limit_service::RateLimitStore;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Fixed-window counters and block records shared across instances.
#[derive(Debug, Clone)]
pub struct RedisRateLimitStore {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisRateLimitStore {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis, prefix: "ratelimit:".to_string() }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    /// INCR and the first EXPIRE run in one MULTI so a counter can never be
    /// left without a TTL. `NX` keeps later increments from sliding the window.
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let mut conn = self.redis.connection();
        let full_key = self.full_key(key);
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&full_key, 1)
            .cmd("PEXPIRE")
            .arg(&full_key)
            .arg(millis(window))
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn attempts(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.redis.connection();
        let count: Option<u64> = conn.get(self.full_key(key)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn set_block(&self, key: &str, reason: &str, duration: Duration) -> anyhow::Result<()> {
        let mut conn = self.redis.connection();
        let full_key = self.full_key(key);
        let blocked_at = OffsetDateTime::now_utc().unix_timestamp();
        let _: () = redis::pipe()
            .atomic()
            .del(&full_key)
            .ignore()
            .hset_multiple(
                &full_key,
                &[
                    ("reason", reason.to_string()),
                    ("blocked_at", blocked_at.to_string()),
                    ("duration_secs", duration.as_secs().to_string()),
                ],
            )
            .ignore()
            .cmd("PEXPIRE")
            .arg(&full_key)
            .arg(millis(duration))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn block_remaining(&self, key: &str) -> anyhow::Result<Option<Duration>> {
        let mut conn = self.redis.connection();
        // -2: no record, -1: no TTL (never written by us).
        let ttl_ms: i64 = redis::cmd("PTTL").arg(self.full_key(key)).query_async(&mut conn).await?;
        Ok(u64::try_from(ttl_ms).ok().filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}
