use crate::config::ChallengeConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// What the verification endpoint said about a token.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeOutcome {
    pub success: bool,
    pub score: Option<f64>,
    pub error_codes: Vec<String>,
    pub hostname: Option<String>,
}

#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("Verification service unreachable: {0}")]
    Transport(String),
    #[error("Verification service returned an unexpected response: {0}")]
    Malformed(String),
}

/// Outbound call to a bot-challenge verification service.
#[async_trait]
pub trait ChallengeProvider: Send + Sync + Debug {
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<IpAddr>,
    ) -> std::result::Result<ChallengeOutcome, ChallengeError>;
}

#[derive(Clone, Debug)]
pub struct ChallengeService {
    provider: Option<Arc<dyn ChallengeProvider>>,
    enabled: bool,
    skip: bool,
    min_score: Option<f64>,
}

impl ChallengeService {
    #[must_use]
    pub fn new(config: &ChallengeConfig, provider: Arc<dyn ChallengeProvider>) -> Self {
        Self { provider: Some(provider), enabled: config.enabled, skip: config.skip, min_score: config.min_score }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { provider: None, enabled: false, skip: false, min_score: None }
    }

    /// False when disabled or skipped.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled && !self.skip && self.provider.is_some()
    }

    /// `Ok(false)` means the caller failed the challenge.
    ///
    /// # Errors
    /// `BadRequest` for an empty token while active, `ServiceUnavailable` when the
    /// verification service could not give an answer.
    #[tracing::instrument(skip(self, token), fields(remote_ip = ?remote_ip), err(level = "warn"))]
    pub async fn verify_token(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<bool> {
        let Some(provider) = self.provider.as_ref().filter(|_| self.is_enabled()) else {
            return Ok(true);
        };

        if token.trim().is_empty() {
            return Err(AppError::BadRequest("Challenge token is required".into()));
        }

        let outcome = provider.verify(token, remote_ip).await.map_err(|e| {
            tracing::error!(error = %e, "Challenge verification failed");
            AppError::ServiceUnavailable(e.to_string())
        })?;

        if !outcome.success {
            tracing::info!(error_codes = ?outcome.error_codes, "Challenge rejected by provider");
            return Ok(false);
        }

        if let (Some(min), Some(score)) = (self.min_score, outcome.score)
            && score < min
        {
            tracing::info!(score, min, "Challenge score below threshold");
            return Ok(false);
        }

        Ok(true)
    }
}
