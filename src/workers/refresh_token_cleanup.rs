use crate::config::CleanupConfig;
use crate::error::Result;
use crate::services::refresh_token_service::RefreshTokenService;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

/// Purges refresh tokens that expired or were revoked longer ago than the retention period.
#[derive(Debug)]
pub struct RefreshTokenCleanupWorker {
    ledger: RefreshTokenService,
    interval_secs: u64,
    retention: time::Duration,
}

impl RefreshTokenCleanupWorker {
    #[must_use]
    pub fn new(ledger: RefreshTokenService, config: &CleanupConfig) -> Self {
        Self {
            ledger,
            interval_secs: config.refresh_token_cleanup_interval_secs,
            retention: time::Duration::days(i64::from(config.refresh_token_retention_days)),
        }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            tracing::info!("Refresh token cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("run_refresh_token_cleanup"))
                        .await
                    {
                        tracing::error!(error = ?e, "Refresh token cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Refresh token cleanup loop shutting down...");
    }

    /// Runs one purge pass.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be purged.
    #[tracing::instrument(skip(self), err, fields(purged = tracing::field::Empty))]
    pub async fn perform_cleanup(&self) -> Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - self.retention;
        let count = self.ledger.purge(cutoff).await?;
        if count > 0 {
            tracing::info!(count, "Purged spent refresh tokens");
            tracing::Span::current().record("purged", count);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRefreshTokenRepository;
    use crate::domain::auth::OpaqueToken;
    use std::sync::Arc;
    use uuid::Uuid;

    fn config(interval: u64) -> CleanupConfig {
        CleanupConfig { refresh_token_cleanup_interval_secs: interval, refresh_token_retention_days: 30 }
    }

    #[tokio::test]
    async fn test_cleanup_purges_only_stale_entries() {
        let ledger = RefreshTokenService::new(Arc::new(MemoryRefreshTokenRepository::new()));
        let user_id = Uuid::new_v4();
        let live = OpaqueToken::generate();
        let recently_expired = OpaqueToken::generate();
        let stale = OpaqueToken::generate();
        ledger.create(user_id, &live, time::Duration::hours(1)).await.unwrap();
        ledger.create(user_id, &recently_expired, time::Duration::days(-1)).await.unwrap();
        ledger.create(user_id, &stale, time::Duration::days(-31)).await.unwrap();

        let worker = RefreshTokenCleanupWorker::new(ledger.clone(), &config(3600));
        assert_eq!(worker.perform_cleanup().await.unwrap(), 1);

        assert!(ledger.lookup(&live).await.is_ok());
        assert!(ledger.lookup(&recently_expired).await.is_ok());
        assert!(ledger.lookup(&stale).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_retention_never_touches_live_tokens() {
        let ledger = RefreshTokenService::new(Arc::new(MemoryRefreshTokenRepository::new()));
        let user_id = Uuid::new_v4();
        let live = OpaqueToken::generate();
        let expired = OpaqueToken::generate();
        ledger.create(user_id, &live, time::Duration::hours(1)).await.unwrap();
        ledger.create(user_id, &expired, time::Duration::minutes(-1)).await.unwrap();

        let config = CleanupConfig { refresh_token_cleanup_interval_secs: 3600, refresh_token_retention_days: 0 };
        let worker = RefreshTokenCleanupWorker::new(ledger.clone(), &config);
        assert_eq!(worker.perform_cleanup().await.unwrap(), 1);

        assert!(ledger.find_by_secret(&live).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_worker_returns_immediately() {
        let ledger = RefreshTokenService::new(Arc::new(MemoryRefreshTokenRepository::new()));
        let (_tx, rx) = tokio::sync::watch::channel(false);

        tokio::time::timeout(Duration::from_secs(1), RefreshTokenCleanupWorker::new(ledger, &config(0)).run(rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let ledger = RefreshTokenService::new(Arc::new(MemoryRefreshTokenRepository::new()));
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(RefreshTokenCleanupWorker::new(ledger, &config(3600)).run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
