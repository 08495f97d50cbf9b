use crate::config::{AuthConfig, RateLimitConfig};
use crate::domain::auth::Claims;
use crate::domain::auth_session::{AuthSession, LogoutScope, RefreshedSession};
use crate::domain::rate_limit::RateLimitKey;
use crate::domain::request::RequestContext;
use crate::domain::user::UserSummary;
use crate::error::{AppError, Result};
use crate::services::audit::{AuditEvent, AuditSink, Severity};
use crate::services::challenge_service::ChallengeService;
use crate::services::credential_service::{CredentialError, CredentialService};
use crate::services::rate_limit_service::{RateLimitPolicy, RateLimiter};
use crate::services::refresh_token_service::RefreshTokenService;
use crate::services::token_service::TokenService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
    pub remember_me: bool,
    pub challenge_token: Option<String>,
}

/// At least one of the two must be present.
#[derive(Debug, Clone, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("helpdesk-auth");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Login attempts by outcome")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Token rotations by outcome")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Successful logouts by scope")
                .build(),
        }
    }
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    result.as_ref().map_or_else(AppError::kind, |_| "success")
}

fn event(name: &'static str, severity: Severity, ctx: &RequestContext) -> AuditEvent {
    let mut event = AuditEvent::new(name, severity);
    if let Some(ip) = ctx.client_ip {
        event = event.with("client_ip", ip);
    }
    if let Some(request_id) = &ctx.request_id {
        event = event.with("request_id", request_id);
    }
    event
}

/// The components a [`SessionService`] sequences.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub challenge: ChallengeService,
    pub credentials: CredentialService,
    pub tokens: TokenService,
    pub ledger: RefreshTokenService,
    pub audit: Arc<dyn AuditSink>,
}

/// Login, refresh, logout and whoami.
///
/// This is the only place that decides which failures count against a
/// caller's rate-limit budget: bad credentials and failed challenges do,
/// caller errors and service errors never do.
#[derive(Clone, Debug)]
pub struct SessionService {
    auth: AuthConfig,
    ip_policy: RateLimitPolicy,
    user_policy: RateLimitPolicy,
    deps: SessionDeps,
    metrics: Metrics,
}

impl SessionService {
    #[must_use]
    pub fn new(auth: AuthConfig, rate_limit: &RateLimitConfig, deps: SessionDeps) -> Self {
        Self {
            auth,
            ip_policy: RateLimitPolicy::login_ip(rate_limit),
            user_policy: RateLimitPolicy::login_user(rate_limit),
            deps,
            metrics: Metrics::new(),
        }
    }

    /// Validates a bearer access token.
    ///
    /// # Errors
    /// `TokenExpired` or `TokenInvalid`.
    pub fn authenticate(&self, access_token: &str) -> Result<Claims> {
        self.deps.tokens.verify_access_token(access_token)
    }

    /// # Errors
    /// See the login pipeline: every gate fails fast with its classified error.
    #[tracing::instrument(
        skip(self, request, ctx),
        fields(client_ip = ?ctx.client_ip, request_id = ?ctx.request_id, user.id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, request: LoginRequest, ctx: &RequestContext) -> Result<AuthSession> {
        let result = self.run_login(request, ctx).await;
        self.metrics.login_total.add(1, &[KeyValue::new("outcome", outcome(&result))]);
        result
    }

    async fn run_login(&self, request: LoginRequest, ctx: &RequestContext) -> Result<AuthSession> {
        if request.identifier.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest("Identifier and password are required".into()));
        }

        let ip_key = ctx.client_ip.map(RateLimitKey::login_ip);
        if let Some(key) = &ip_key {
            self.enforce(key, self.ip_policy, ctx).await?;
        }

        let challenge_token = request.challenge_token.as_deref().unwrap_or_default();
        if !self.deps.challenge.verify_token(challenge_token, ctx.client_ip).await? {
            self.record_failure(ip_key.as_ref(), None).await;
            self.deps.audit.emit(event("login_challenge_rejected", Severity::Warning, ctx));
            return Err(AppError::ChallengeRejected);
        }

        let user = match self.deps.credentials.find_by_identifier(&request.identifier).await {
            Ok(user) => user,
            Err(CredentialError::NotFound) => {
                self.record_failure(ip_key.as_ref(), None).await;
                self.deps.audit.emit(
                    event("login_failed", Severity::Warning, ctx).with("reason", CredentialError::NotFound.reason()),
                );
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };
        tracing::Span::current().record("user.id", tracing::field::display(user.id));

        let user_key = RateLimitKey::login_user(user.id);
        self.enforce(&user_key, self.user_policy, ctx).await?;

        match self.deps.credentials.verify_password(&user, &request.password).await {
            Ok(()) => {}
            Err(CredentialError::Mismatch) => {
                self.record_failure(ip_key.as_ref(), Some(&user_key)).await;
                self.deps.audit.emit(
                    event("login_failed", Severity::Warning, ctx)
                        .with("reason", CredentialError::Mismatch.reason())
                        .with("user_id", user.id),
                );
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        }

        if !user.is_active() {
            self.deps.audit.emit(event("login_inactive_account", Severity::Warning, ctx).with("user_id", user.id));
            return Err(AppError::AccountInactive);
        }

        let access_token = self.deps.tokens.issue_for(&user)?;
        let refresh_token = self.deps.tokens.issue_refresh_secret();
        let refresh_ttl = self.auth.refresh_ttl(request.remember_me);
        self.deps.ledger.create(user.id, &refresh_token, refresh_ttl).await?;

        self.deps.audit.emit(
            event("login_succeeded", Severity::Info, ctx)
                .with("user_id", user.id)
                .with("remember_me", request.remember_me),
        );
        tracing::info!("Login succeeded");

        Ok(AuthSession {
            access_token,
            refresh_token,
            access_ttl_secs: self.deps.tokens.access_ttl_secs(),
            refresh_ttl_secs: whole_secs(refresh_ttl),
            user: user.summary(),
        })
    }

    /// Rotates a refresh token. Failures before the old token is revoked leave
    /// it usable; failures after it are terminal for that token.
    ///
    /// # Errors
    /// `TokenInvalid`, `TokenExpired`, `TokenRevoked`, or a service error.
    #[tracing::instrument(
        skip(self, refresh_token, ctx),
        fields(client_ip = ?ctx.client_ip, request_id = ?ctx.request_id, user.id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn refresh(&self, refresh_token: &str, ctx: &RequestContext) -> Result<RefreshedSession> {
        let result = self.run_refresh(refresh_token, ctx).await;
        self.metrics.refresh_total.add(1, &[KeyValue::new("outcome", outcome(&result))]);
        result
    }

    async fn run_refresh(&self, refresh_token: &str, ctx: &RequestContext) -> Result<RefreshedSession> {
        if refresh_token.trim().is_empty() {
            return Err(AppError::BadRequest("Refresh token is required".into()));
        }

        let entry = match self.deps.ledger.find_by_secret(refresh_token).await {
            Ok(entry) => entry,
            Err(AppError::TokenRevoked) => {
                self.on_revoked_reuse(refresh_token, ctx).await;
                return Err(AppError::TokenRevoked);
            }
            Err(AppError::TokenExpired) => {
                self.deps.audit.emit(event("refresh_token_expired", Severity::Info, ctx));
                return Err(AppError::TokenExpired);
            }
            Err(AppError::TokenInvalid) => {
                self.deps.audit.emit(event("refresh_token_unknown", Severity::Warning, ctx));
                return Err(AppError::TokenInvalid);
            }
            Err(e) => return Err(e),
        };
        tracing::Span::current().record("user.id", tracing::field::display(entry.user_id));

        // Past this point the presented token is spent, whatever happens next.
        if let Err(e) = self.deps.ledger.revoke_entry(&entry).await {
            if matches!(e, AppError::TokenRevoked) {
                self.deps.audit.emit(
                    event("refresh_token_reuse", Severity::High, ctx)
                        .with("user_id", entry.user_id)
                        .with("detail", "lost concurrent rotation"),
                );
            }
            return Err(e);
        }

        let user = match self.deps.credentials.find_by_id(entry.user_id).await {
            Ok(user) if user.is_active() => user,
            Ok(_) | Err(CredentialError::NotFound) => {
                self.deps.audit.emit(event("refresh_for_missing_user", Severity::High, ctx).with("user_id", entry.user_id));
                return Err(AppError::TokenInvalid);
            }
            Err(e) => return Err(e.into()),
        };

        let access_token = self.deps.tokens.issue_for(&user)?;
        let new_secret = self.deps.tokens.issue_refresh_secret();
        let lifetime = entry.lifetime();
        self.deps.ledger.create(user.id, &new_secret, lifetime).await?;

        self.deps.audit.emit(event("refresh_succeeded", Severity::Info, ctx).with("user_id", user.id));
        tracing::info!("Tokens rotated successfully");

        Ok(RefreshedSession {
            access_token,
            access_ttl_secs: self.deps.tokens.access_ttl_secs(),
            refresh_token: new_secret,
            refresh_ttl_secs: whole_secs(lifetime),
        })
    }

    async fn on_revoked_reuse(&self, refresh_token: &str, ctx: &RequestContext) {
        let owner = self.deps.ledger.lookup(refresh_token).await.ok().map(|entry| entry.user_id);
        let mut audit = event("refresh_token_reuse", Severity::High, ctx);
        if let Some(user_id) = owner {
            audit = audit.with("user_id", user_id);
        }
        self.deps.audit.emit(audit);

        if let (true, Some(user_id)) = (self.auth.revoke_all_on_reuse, owner) {
            match self.deps.ledger.revoke_all_for_user(user_id).await {
                Ok(count) => tracing::warn!(user.id = %user_id, count, "Revoked all sessions after token reuse"),
                Err(e) => tracing::error!(error = %e, user.id = %user_id, "Failed to revoke sessions after token reuse"),
            }
        }
    }

    /// Revokes one refresh token, or every token of the authenticated user when none is given.
    ///
    /// # Errors
    /// `BadRequest` when neither is supplied, `TokenInvalid` for an unknown or
    /// foreign token, `TokenRevoked` when it was already revoked.
    #[tracing::instrument(
        skip(self, request, ctx),
        fields(client_ip = ?ctx.client_ip, request_id = ?ctx.request_id, user.id = ?request.user_id),
        err(level = "warn")
    )]
    pub async fn logout(&self, request: LogoutRequest, ctx: &RequestContext) -> Result<LogoutScope> {
        let refresh_token = request.refresh_token.filter(|t| !t.trim().is_empty());

        let scope = match (refresh_token, request.user_id) {
            (Some(secret), caller) => {
                let entry = self.deps.ledger.lookup(&secret).await?;
                if let Some(caller) = caller
                    && caller != entry.user_id
                {
                    self.deps.audit.emit(
                        event("logout_foreign_token", Severity::High, ctx)
                            .with("user_id", caller)
                            .with("owner_id", entry.user_id),
                    );
                    return Err(AppError::TokenInvalid);
                }
                if entry.is_revoked() {
                    return Err(AppError::TokenRevoked);
                }
                self.deps.ledger.revoke_entry(&entry).await?;
                self.deps.audit.emit(event("logout", Severity::Info, ctx).with("user_id", entry.user_id));
                LogoutScope::Session
            }
            (None, Some(user_id)) => {
                let revoked = self.deps.ledger.revoke_all_for_user(user_id).await?;
                self.deps.audit.emit(
                    event("logout_everywhere", Severity::Info, ctx).with("user_id", user_id).with("revoked", revoked),
                );
                LogoutScope::Everywhere { revoked }
            }
            (None, None) => {
                return Err(AppError::BadRequest("A refresh token or an authenticated user is required".into()));
            }
        };

        let label = match scope {
            LogoutScope::Session => "session",
            LogoutScope::Everywhere { .. } => "everywhere",
        };
        self.metrics.logout_total.add(1, &[KeyValue::new("scope", label)]);
        Ok(scope)
    }

    /// Profile of the identity behind an already validated access token.
    ///
    /// # Errors
    /// `NotFound` when the identity was deleted or deactivated since the token was issued.
    #[tracing::instrument(skip(self, ctx), fields(request_id = ?ctx.request_id), err(level = "warn"))]
    pub async fn whoami(&self, user_id: Uuid, ctx: &RequestContext) -> Result<UserSummary> {
        match self.deps.credentials.find_by_id(user_id).await {
            Ok(user) if user.is_active() => Ok(user.summary()),
            Ok(_) | Err(CredentialError::NotFound) => {
                self.deps.audit.emit(event("whoami_unknown_identity", Severity::High, ctx).with("user_id", user_id));
                Err(AppError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn enforce(&self, key: &RateLimitKey, policy: RateLimitPolicy, ctx: &RequestContext) -> Result<()> {
        if let Some(retry_after) = self.deps.rate_limiter.blocked_for(key).await {
            self.deps.audit.emit(event("login_blocked", Severity::Warning, ctx).with("key", key));
            return Err(AppError::Blocked { retry_after });
        }

        if !self.deps.rate_limiter.check_limit(key, policy.limit).await {
            self.deps.rate_limiter.block(key, policy.block, "login attempts exceeded").await;
            self.deps.audit.emit(
                event("login_rate_limited", Severity::High, ctx)
                    .with("key", key)
                    .with("block_secs", policy.block.as_secs()),
            );
            return Err(AppError::RateLimited { retry_after: policy.block });
        }

        Ok(())
    }

    async fn record_failure(&self, ip_key: Option<&RateLimitKey>, user_key: Option<&RateLimitKey>) {
        if let Some(key) = ip_key {
            self.deps.rate_limiter.increment(key, self.ip_policy.window).await;
        }
        if let Some(key) = user_key {
            self.deps.rate_limiter.increment(key, self.user_policy.window).await;
        }
    }
}

fn whole_secs(duration: time::Duration) -> u64 {
    u64::try_from(duration.whole_seconds()).unwrap_or(0)
}
