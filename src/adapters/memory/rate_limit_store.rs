use crate::services::rate_limit_service::RateLimitStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct BlockRecord {
    reason: String,
    until: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    counters: DashMap<String, WindowCounter>,
    blocks: DashMap<String, BlockRecord>,
}

impl MemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Why `key` is blocked, while the block lasts.
    #[must_use]
    pub fn block_reason(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.blocks.get(key).filter(|b| b.until > now).map(|b| b.reason.clone())
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let now = Instant::now();
        let mut counter =
            self.counters.entry(key.to_string()).or_insert(WindowCounter { count: 0, expires_at: now + window });
        if counter.expires_at <= now {
            *counter = WindowCounter { count: 0, expires_at: now + window };
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn attempts(&self, key: &str) -> anyhow::Result<u64> {
        let now = Instant::now();
        Ok(self.counters.get(key).filter(|c| c.expires_at > now).map_or(0, |c| c.count))
    }

    async fn set_block(&self, key: &str, reason: &str, duration: Duration) -> anyhow::Result<()> {
        let record = BlockRecord { reason: reason.to_string(), until: Instant::now() + duration };
        self.blocks.insert(key.to_string(), record);
        Ok(())
    }

    async fn block_remaining(&self, key: &str) -> anyhow::Result<Option<Duration>> {
        let now = Instant::now();
        let remaining = self.blocks.get(key).and_then(|b| b.until.checked_duration_since(now)).filter(|d| !d.is_zero());
        if remaining.is_none() {
            self.blocks.remove_if(key, |_, b| b.until <= now);
        }
        Ok(remaining)
    }
}
