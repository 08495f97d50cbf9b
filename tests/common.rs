#![allow(dead_code)]

use async_trait::async_trait;
use helpdesk_auth::AppBuilder;
use helpdesk_auth::adapters::memory::{MemoryRateLimitStore, MemoryRefreshTokenRepository, MemoryUserRepository};
use helpdesk_auth::config::Config;
use helpdesk_auth::domain::user::{Role, User};
use helpdesk_auth::services::audit::MemoryAuditSink;
use helpdesk_auth::services::challenge_service::{ChallengeError, ChallengeOutcome, ChallengeProvider};
use helpdesk_auth::services::credential_service::UserRepository;
use helpdesk_auth::services::refresh_token_service::RefreshTokenRepository;
use reqwest::Client;
use serde_json::{Value, json};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("helpdesk_auth=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    use clap::Parser;
    Config::try_parse_from([
        "helpdesk-auth",
        "--database-url",
        "postgres://unused@localhost/helpdesk",
        "--jwt-secret",
        "test_secret",
        "--trusted-proxies",
        "127.0.0.1/32,::1/128",
    ])
    .unwrap()
}

/// Outcome a [`StubChallenge`] hands back for every token.
#[derive(Debug, Clone, Copy)]
pub enum ChallengeMode {
    Pass,
    Reject,
    Unreachable,
}

#[derive(Debug)]
pub struct StubChallenge {
    pub mode: ChallengeMode,
    pub calls: AtomicUsize,
}

impl StubChallenge {
    pub fn new(mode: ChallengeMode) -> Arc<Self> {
        Arc::new(Self { mode, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeProvider for StubChallenge {
    async fn verify(&self, token: &str, _remote_ip: Option<IpAddr>) -> Result<ChallengeOutcome, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ChallengeMode::Pass => {
                Ok(ChallengeOutcome { success: token == "human", score: None, error_codes: vec![], hostname: None })
            }
            ChallengeMode::Reject => Ok(ChallengeOutcome {
                success: false,
                score: None,
                error_codes: vec!["invalid-input-response".into()],
                hostname: None,
            }),
            ChallengeMode::Unreachable => Err(ChallengeError::Transport("connection refused".into())),
        }
    }
}

pub struct TestApp {
    pub server_url: String,
    pub client: Client,
    pub users: Arc<MemoryUserRepository>,
    pub refresh_tokens: Arc<MemoryRefreshTokenRepository>,
    pub audit: MemoryAuditSink,
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with(config, None).await
    }

    pub async fn spawn_with(config: Config, challenge: Option<Arc<StubChallenge>>) -> Self {
        setup_tracing();

        let users = Arc::new(MemoryUserRepository::new());
        let refresh_tokens = Arc::new(MemoryRefreshTokenRepository::new());
        let audit = MemoryAuditSink::new();

        let mut builder = AppBuilder::new(config)
            .with_user_repository(Arc::clone(&users) as Arc<dyn UserRepository>)
            .with_refresh_token_repository(Arc::clone(&refresh_tokens) as Arc<dyn RefreshTokenRepository>)
            .with_rate_limit_store(Arc::new(MemoryRateLimitStore::new()))
            .with_audit_sink(Arc::new(audit.clone()));
        if let Some(provider) = challenge {
            builder = builder.with_challenge_provider(provider);
        }
        let app = builder.build().expect("Failed to build app");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let mut server_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, app.router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = server_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            server_url: format!("http://{addr}"),
            client: Client::new(),
            users,
            refresh_tokens,
            audit,
            shutdown_tx,
        }
    }

    /// Seeds a user with a unique address and [`PASSWORD`].
    pub fn seed_user(&self, role: Role) -> User {
        let run_id = &Uuid::new_v4().to_string()[..8];
        self.users.seed(&format!("agent_{run_id}@helpdesk.test"), PASSWORD, role).unwrap()
    }

    pub async fn login(&self, body: &Value) -> reqwest::Response {
        self.client.post(format!("{}/v1/auth/login", self.server_url)).json(body).send().await.unwrap()
    }

    pub async fn login_from(&self, client_ip: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/auth/login", self.server_url))
            .header("X-Forwarded-For", client_ip)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Logs `user` in and returns the session body.
    pub async fn login_ok(&self, user: &User, remember_me: bool) -> Value {
        let resp = self.login(&json!({ "email": user.email, "password": PASSWORD, "rememberMe": remember_me })).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/auth/refresh", self.server_url))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .unwrap()
    }

    pub async fn logout(&self, access_token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = self.client.post(format!("{}/v1/auth/logout", self.server_url)).json(body);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    pub async fn logout_without_body(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(format!("{}/v1/auth/logout", self.server_url));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    pub async fn me(&self, access_token: &str) -> reqwest::Response {
        self.client.get(format!("{}/v1/auth/me", self.server_url)).bearer_auth(access_token).send().await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
