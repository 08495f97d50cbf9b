use crate::adapters::challenge::HttpChallengeProvider;
use crate::adapters::database::{DbPool, PgRefreshTokenRepository, PgUserRepository};
use crate::adapters::memory::MemoryRateLimitStore;
use crate::adapters::redis::{RedisClient, RedisRateLimitStore};
use crate::api::{self, AppState, client_ip::ClientIpResolver};
use crate::config::Config;
use crate::services::audit::{AuditSink, TracingAuditSink};
use crate::services::challenge_service::{ChallengeProvider, ChallengeService};
use crate::services::credential_service::{CredentialService, UserRepository};
use crate::services::rate_limit_service::{NoopRateLimiter, RateLimitService, RateLimitStore, RateLimiter};
use crate::services::refresh_token_service::{RefreshTokenRepository, RefreshTokenService};
use crate::services::session_service::{SessionDeps, SessionService};
use crate::services::token_service::TokenService;
use crate::workers::RefreshTokenCleanupWorker;
use anyhow::{Context, bail};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Background tasks started alongside the server.
#[derive(Debug)]
pub struct Workers {
    refresh_token_cleanup: RefreshTokenCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(
            self.refresh_token_cleanup
                .run(shutdown_rx)
                .instrument(tracing::info_span!("refresh_token_cleanup_worker")),
        )]
    }
}

#[derive(Debug)]
pub struct App {
    pub router: axum::Router,
    pub sessions: SessionService,
    pub workers: Workers,
}

/// Wires adapters into services. Anything not injected explicitly is derived from
/// the configuration and the database/redis handles.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    redis: Option<Arc<RedisClient>>,
    users: Option<Arc<dyn UserRepository>>,
    refresh_tokens: Option<Arc<dyn RefreshTokenRepository>>,
    rate_limit_store: Option<Arc<dyn RateLimitStore>>,
    challenge_provider: Option<Arc<dyn ChallengeProvider>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            pool: None,
            redis: None,
            users: None,
            refresh_tokens: None,
            rate_limit_store: None,
            challenge_provider: None,
            audit: None,
        }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    #[must_use]
    pub fn with_user_repository(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    #[must_use]
    pub fn with_refresh_token_repository(mut self, refresh_tokens: Arc<dyn RefreshTokenRepository>) -> Self {
        self.refresh_tokens = Some(refresh_tokens);
        self
    }

    #[must_use]
    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_challenge_provider(mut self, provider: Arc<dyn ChallengeProvider>) -> Self {
        self.challenge_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// # Errors
    /// Returns an error if a required dependency is missing or misconfigured.
    pub fn build(self) -> anyhow::Result<App> {
        if self.config.auth.jwt_secret.is_empty() {
            bail!("JWT secret must not be empty");
        }

        let users: Arc<dyn UserRepository> = match (self.users, &self.pool) {
            (Some(users), _) => users,
            (None, Some(pool)) => Arc::new(PgUserRepository::new(pool.clone())),
            (None, None) => bail!("no user repository configured"),
        };
        let refresh_tokens: Arc<dyn RefreshTokenRepository> = match (self.refresh_tokens, &self.pool) {
            (Some(repo), _) => repo,
            (None, Some(pool)) => Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            (None, None) => bail!("no refresh token repository configured"),
        };

        let rate_limiter: Arc<dyn RateLimiter> = if self.config.rate_limit.enabled {
            let store: Arc<dyn RateLimitStore> = match (self.rate_limit_store, self.redis) {
                (Some(store), _) => store,
                (None, Some(redis)) => Arc::new(RedisRateLimitStore::new(redis)),
                (None, None) => {
                    tracing::warn!("No redis configured, rate limit counters are local to this process");
                    Arc::new(MemoryRateLimitStore::new())
                }
            };
            Arc::new(RateLimitService::new(store))
        } else {
            tracing::warn!("Login rate limiting is disabled");
            Arc::new(NoopRateLimiter)
        };

        let challenge_config = &self.config.challenge;
        let challenge = if challenge_config.is_active() {
            let provider: Arc<dyn ChallengeProvider> = match self.challenge_provider {
                Some(provider) => provider,
                None => {
                    if challenge_config.secret_key.is_empty() {
                        bail!("challenge verification is enabled but no secret key is set");
                    }
                    Arc::new(
                        HttpChallengeProvider::new(challenge_config).context("failed to build challenge client")?,
                    )
                }
            };
            ChallengeService::new(challenge_config, provider)
        } else {
            if challenge_config.enabled {
                tracing::warn!("Challenge verification is enabled but skipped");
            }
            ChallengeService::disabled()
        };

        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink::new()));
        let ledger = RefreshTokenService::new(refresh_tokens);

        let deps = SessionDeps {
            rate_limiter,
            challenge,
            credentials: CredentialService::new(users),
            tokens: TokenService::new(&self.config.auth),
            ledger: ledger.clone(),
            audit,
        };
        let sessions = SessionService::new(self.config.auth.clone(), &self.config.rate_limit, deps);

        let state = AppState {
            sessions: sessions.clone(),
            client_ip: ClientIpResolver::new(self.config.server.trusted_proxies.clone()),
        };
        let router = api::app_router(state, Duration::from_secs(self.config.server.request_timeout_secs));

        let workers =
            Workers { refresh_token_cleanup: RefreshTokenCleanupWorker::new(ledger, &self.config.cleanup) };

        Ok(App { router, sessions, workers })
    }
}
