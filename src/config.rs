use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub redis: RedisConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub challenge: ChallengeConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub cleanup: CleanupConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(id = "database_url", long = "database-url", env = "HELPDESK_DATABASE_URL")]
    pub url: String,

    /// Maximum pooled connections
    #[arg(long = "db-max-connections", env = "HELPDESK_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// How long to wait for a pooled connection before failing
    #[arg(long = "db-acquire-timeout-secs", env = "HELPDESK_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "HELPDESK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "HELPDESK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "HELPDESK_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,

    /// Upper bound on a single request, in seconds
    #[arg(long, env = "HELPDESK_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// How long to wait for background tasks on shutdown
    #[arg(long, env = "HELPDESK_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RedisConfig {
    /// Redis/Valkey URL backing rate-limit counters and blocks
    #[arg(id = "redis_url", long = "redis-url", env = "HELPDESK_REDIS_URL")]
    pub url: Option<String>,

    /// Minimum backoff when connecting
    #[arg(long, env = "HELPDESK_REDIS_MIN_BACKOFF_SECS", default_value_t = 1)]
    pub min_backoff_secs: u64,

    /// Maximum backoff when connecting
    #[arg(long, env = "HELPDESK_REDIS_MAX_BACKOFF_SECS", default_value_t = 10)]
    pub max_backoff_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing
    #[arg(long, env = "HELPDESK_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "HELPDESK_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in hours for "remember me" sessions
    #[arg(long, env = "HELPDESK_REFRESH_TOKEN_TTL_HOURS", default_value_t = 168)]
    pub refresh_token_ttl_hours: u64,

    /// Cap on the refresh lifetime of sessions without "remember me"
    #[arg(long, env = "HELPDESK_SHORT_SESSION_MAX_HOURS", default_value_t = 24)]
    pub short_session_max_hours: u64,

    /// Revoke every refresh token of a user when one of their revoked tokens is replayed
    #[arg(long, env = "HELPDESK_REVOKE_ALL_ON_REUSE", default_value_t = false)]
    pub revoke_all_on_reuse: bool,
}

impl AuthConfig {
    /// Refresh lifetime for a new login. Non-persistent sessions get half the
    /// configured lifetime, capped at `short_session_max_hours`.
    #[must_use]
    pub fn refresh_ttl(&self, remember_me: bool) -> time::Duration {
        let full = time::Duration::hours(i64::try_from(self.refresh_token_ttl_hours).unwrap_or(i64::MAX / 3600));
        if remember_me {
            return full;
        }
        let cap = time::Duration::hours(i64::try_from(self.short_session_max_hours).unwrap_or(i64::MAX / 3600));
        std::cmp::min(full / 2, cap)
    }
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Disable to substitute a no-op limiter
    #[arg(
        id = "rate_limit_enabled",
        long = "rate-limit-enabled",
        env = "HELPDESK_RATE_LIMIT_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enabled: bool,

    /// Failed login attempts allowed per client IP within the window
    #[arg(long, env = "HELPDESK_LOGIN_IP_LIMIT", default_value_t = 20)]
    pub login_ip_limit: u64,

    /// Per-IP counting window in seconds
    #[arg(long, env = "HELPDESK_LOGIN_IP_WINDOW_SECS", default_value_t = 900)]
    pub login_ip_window_secs: u64,

    /// How long an IP stays blocked after exceeding its budget
    #[arg(long, env = "HELPDESK_LOGIN_IP_BLOCK_SECS", default_value_t = 900)]
    pub login_ip_block_secs: u64,

    /// Failed login attempts allowed per account within the window
    #[arg(long, env = "HELPDESK_LOGIN_USER_LIMIT", default_value_t = 5)]
    pub login_user_limit: u64,

    /// Per-account counting window in seconds
    #[arg(long, env = "HELPDESK_LOGIN_USER_WINDOW_SECS", default_value_t = 900)]
    pub login_user_window_secs: u64,

    /// How long an account stays blocked after exceeding its budget
    #[arg(long, env = "HELPDESK_LOGIN_USER_BLOCK_SECS", default_value_t = 1800)]
    pub login_user_block_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ChallengeConfig {
    /// Require a bot-challenge token on login
    #[arg(
        id = "challenge_enabled",
        long = "challenge-enabled",
        env = "HELPDESK_CHALLENGE_ENABLED",
        default_value_t = false
    )]
    pub enabled: bool,

    /// Accept every token without calling the verifier, even when enabled
    #[arg(id = "challenge_skip", long = "challenge-skip", env = "HELPDESK_CHALLENGE_SKIP", default_value_t = false)]
    pub skip: bool,

    /// Secret key shared with the verification service
    #[arg(long = "challenge-secret-key", env = "HELPDESK_CHALLENGE_SECRET_KEY", default_value = "")]
    pub secret_key: String,

    /// Verification endpoint
    #[arg(
        long = "challenge-verify-url",
        env = "HELPDESK_CHALLENGE_VERIFY_URL",
        default_value = "https://challenges.cloudflare.com/turnstile/v0/siteverify"
    )]
    pub verify_url: String,

    /// Timeout for a verification round-trip
    #[arg(long = "challenge-timeout-ms", env = "HELPDESK_CHALLENGE_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Reject tokens whose score is below this value, when the provider reports one
    #[arg(long = "challenge-min-score", env = "HELPDESK_CHALLENGE_MIN_SCORE")]
    pub min_score: Option<f64>,
}

impl ChallengeConfig {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && !self.skip
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "HELPDESK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported when set
    #[arg(long, env = "HELPDESK_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct CleanupConfig {
    /// How often to purge spent refresh tokens (0 disables)
    #[arg(long, env = "HELPDESK_REFRESH_TOKEN_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub refresh_token_cleanup_interval_secs: u64,

    /// Expired or revoked refresh tokens are kept this long for audit
    #[arg(long, env = "HELPDESK_REFRESH_TOKEN_RETENTION_DAYS", default_value_t = 30)]
    pub refresh_token_retention_days: u32,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(hours: u64) -> AuthConfig {
        AuthConfig {
            jwt_secret: "s".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_hours: hours,
            short_session_max_hours: 24,
            revoke_all_on_reuse: false,
        }
    }

    #[test]
    fn test_short_session_is_capped_for_long_lifetimes() {
        let config = auth_config(168);
        assert_eq!(config.refresh_ttl(true), time::Duration::hours(168));
        assert_eq!(config.refresh_ttl(false), time::Duration::hours(24));
    }

    #[test]
    fn test_short_session_is_half_for_short_lifetimes() {
        let config = auth_config(12);
        assert_eq!(config.refresh_ttl(false), time::Duration::hours(6));
        assert!(config.refresh_ttl(false) < config.refresh_ttl(true));
    }

    #[test]
    fn test_parse_defaults() {
        let config =
            Config::try_parse_from(["helpdesk-auth", "--database-url", "postgres://x", "--jwt-secret", "k"]).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.login_user_limit, 5);
        assert!(!config.challenge.is_active());
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_argument_ids_are_unique() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }

    #[test]
    fn test_same_named_fields_parse_independently() {
        let config = Config::try_parse_from([
            "helpdesk-auth",
            "--database-url",
            "postgres://db",
            "--redis-url",
            "redis://cache",
            "--jwt-secret",
            "k",
            "--rate-limit-enabled",
            "false",
            "--challenge-enabled",
        ])
        .unwrap();
        assert_eq!(config.database.url, "postgres://db");
        assert_eq!(config.redis.url.as_deref(), Some("redis://cache"));
        assert!(!config.rate_limit.enabled);
        assert!(config.challenge.enabled);
    }

    #[test]
    fn test_negative_retention_is_rejected() {
        let parsed = Config::try_parse_from([
            "helpdesk-auth",
            "--database-url",
            "postgres://x",
            "--jwt-secret",
            "k",
            "--refresh-token-retention-days=-1",
        ]);
        assert!(parsed.is_err());
    }
}
