use crate::config::AuthConfig;
use crate::domain::auth::{Claims, OpaqueToken, TokenType};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Mints signed access tokens and opaque refresh secrets.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("access_ttl_secs", &self.access_ttl_secs).finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl_secs: config.access_token_ttl_secs,
        }
    }

    #[must_use]
    pub const fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn issue_access_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::Internal
        })
    }

    /// Builds access claims for `user` and signs them.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn issue_for(&self, user: &User) -> Result<String> {
        let claims = Claims::access(user.id, user.email.clone(), user.role, self.access_ttl_secs);
        self.issue_access_token(&claims)
    }

    /// A fresh 256-bit secret. Never signed, never stored in the clear.
    #[must_use]
    pub fn issue_refresh_secret(&self) -> String {
        OpaqueToken::generate()
    }

    /// Verifies signature, expiry and the `typ` discriminator.
    ///
    /// # Errors
    /// `TokenExpired` for an expired but otherwise valid token, `TokenInvalid` for anything else.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid,
        })?;

        if data.claims.typ != TokenType::Access {
            tracing::warn!(typ = ?data.claims.typ, "Rejected token with wrong type");
            return Err(AppError::TokenInvalid);
        }

        Ok(data.claims)
    }
}
