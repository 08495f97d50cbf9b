use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account inactive")]
    AccountInactive,
    #[error("Blocked, retry after {retry_after:?}")]
    Blocked { retry_after: Duration },
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("Challenge rejected")]
    ChallengeRejected,
    #[error("Token invalid")]
    TokenInvalid,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token revoked")]
    TokenRevoked,
    #[error("Not found")]
    NotFound,
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The one place an error kind becomes a status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::ChallengeRejected
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenRevoked => StatusCode::UNAUTHORIZED,
            Self::AccountInactive => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Blocked { .. } | Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Store(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Retry hint for throttling outcomes.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Blocked { retry_after } | Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Stable label for metrics and audit fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountInactive => "account_inactive",
            Self::Blocked { .. } => "blocked",
            Self::RateLimited { .. } => "rate_limited",
            Self::ChallengeRejected => "challenge_rejected",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::TokenRevoked => "token_revoked",
            Self::NotFound => "not_found",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Database(_) | Self::Store(_) | Self::Internal => "service_error",
        }
    }

    /// Whether this failure came from our own infrastructure rather than the caller.
    #[must_use]
    pub const fn is_service_error(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Database(_) | Self::Store(_) | Self::Internal)
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::InvalidCredentials => "Invalid credentials".to_string(),
            Self::AccountInactive => "Account inactive".to_string(),
            Self::Blocked { .. } | Self::RateLimited { .. } => "Too many attempts".to_string(),
            Self::ChallengeRejected => "Challenge verification failed".to_string(),
            Self::TokenInvalid => "Invalid token".to_string(),
            Self::TokenExpired => "Token expired".to_string(),
            Self::TokenRevoked => "Token revoked".to_string(),
            Self::NotFound => "Not found".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
            Self::Database(_) | Self::Store(_) | Self::Internal => "Internal server error".to_string(),
        }
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Database(e) => tracing::error!(error = %e, "Database error"),
            Self::Store(e) => tracing::error!(error = ?e, "Store error"),
            Self::ServiceUnavailable(cause) => tracing::error!(cause = %cause, "Dependency unavailable"),
            Self::Internal => tracing::error!("Internal server error occurred"),
            other => tracing::debug!(error = %other, "Request rejected"),
        }

        let status = self.status();
        let body = Json(json!({
            "error": self.public_message()
        }));

        match self.retry_after() {
            Some(retry_after) => {
                (status, [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())], body).into_response()
            }
            None => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::RateLimited { retry_after: Duration::from_secs(3) }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::ServiceUnavailable("down".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_retry_after_header() {
        let response = AppError::Blocked { retry_after: Duration::from_millis(1500) }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "2");
    }

    #[test]
    fn test_service_errors_hide_cause() {
        let err = AppError::Store(anyhow::anyhow!("redis at 10.0.0.3 refused"));
        assert!(err.is_service_error());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_retry_after_rounding() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(900)), 900);
        assert_eq!(retry_after_secs(Duration::from_millis(900_001)), 901);
    }
}
