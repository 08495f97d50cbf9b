use crate::config::ChallengeConfig;
use crate::services::challenge_service::{ChallengeError, ChallengeOutcome, ChallengeProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Turnstile/reCAPTCHA-style `siteverify` response.
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
    #[serde(default)]
    hostname: Option<String>,
}

/// Posts the caller's token to a `siteverify` endpoint as a form.
#[derive(Debug, Clone)]
pub struct HttpChallengeProvider {
    client: Client,
    verify_url: String,
    secret_key: String,
}

impl HttpChallengeProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ChallengeConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_millis(config.timeout_ms)).build()?;
        Ok(Self { client, verify_url: config.verify_url.clone(), secret_key: config.secret_key.clone() })
    }
}

#[async_trait]
impl ChallengeProvider for HttpChallengeProvider {
    #[tracing::instrument(level = "debug", skip(self, token), err)]
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<ChallengeOutcome, ChallengeError> {
        let mut form = vec![("secret", self.secret_key.clone()), ("response", token.to_string())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ChallengeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChallengeError::Transport(format!("verification endpoint returned {status}")));
        }

        let body: SiteVerifyResponse =
            response.json().await.map_err(|e| ChallengeError::Malformed(e.to_string()))?;

        Ok(ChallengeOutcome {
            success: body.success,
            score: body.score,
            error_codes: body.error_codes,
            hostname: body.hostname,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Form, Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/siteverify")
    }

    fn config(verify_url: String) -> ChallengeConfig {
        ChallengeConfig {
            enabled: true,
            skip: false,
            secret_key: "shh".into(),
            verify_url,
            timeout_ms: 2000,
            min_score: None,
        }
    }

    #[tokio::test]
    async fn test_posts_form_and_parses_outcome() {
        let router = Router::new().route(
            "/siteverify",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let ok = form.get("secret").map(String::as_str) == Some("shh")
                    && form.get("response").map(String::as_str) == Some("good-token")
                    && form.get("remoteip").map(String::as_str) == Some("198.51.100.4");
                Json(json!({
                    "success": ok,
                    "score": 0.7,
                    "error-codes": if ok { Vec::<&str>::new() } else { vec!["invalid-input-response"] },
                    "hostname": "helpdesk.test"
                }))
            }),
        );
        let provider = HttpChallengeProvider::new(&config(serve(router).await)).unwrap();

        let outcome = provider.verify("good-token", Some("198.51.100.4".parse().unwrap())).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, Some(0.7));
        assert_eq!(outcome.hostname.as_deref(), Some("helpdesk.test"));

        let outcome = provider.verify("bad-token", None).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error_codes, vec!["invalid-input-response".to_string()]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let router = Router::new().route("/siteverify", post(|| async { StatusCode::BAD_GATEWAY }));
        let provider = HttpChallengeProvider::new(&config(serve(router).await)).unwrap();

        assert!(matches!(provider.verify("t", None).await, Err(ChallengeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed() {
        let router = Router::new().route("/siteverify", post(|| async { Json(Value::String("nope".into())) }));
        let provider = HttpChallengeProvider::new(&config(serve(router).await)).unwrap();

        assert!(matches!(provider.verify("t", None).await, Err(ChallengeError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let provider = HttpChallengeProvider::new(&config("http://127.0.0.1:9/siteverify".into())).unwrap();
        assert!(matches!(provider.verify("t", None).await, Err(ChallengeError::Transport(_))));
    }
}
