use crate::config::RedisConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod rate_limit_store;

pub use rate_limit_store::RedisRateLimitStore;

const CONNECT_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every attempt fails.
    pub async fn connect(url: &str, config: &RedisConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(url)?;
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(config.max_backoff_secs))
            .with_max_times(CONNECT_ATTEMPTS);

        let connection = (|| async { client.get_connection_manager().await })
            .retry(&retry_strategy)
            .when(|e| {
                tracing::warn!(error = %e, "Failed to connect to redis, retrying...");
                true
            })
            .notify(|e, duration| {
                tracing::debug!("Redis connect retry in {:?} due to error: {:?}", duration, e);
            })
            .await?;

        tracing::info!("Connected to redis");
        Ok(Arc::new(Self { connection }))
    }

    /// Returns a multiplexed connection for standard Redis commands.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }
}
