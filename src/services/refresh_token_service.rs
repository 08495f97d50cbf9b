use crate::domain::auth::{OpaqueToken, RefreshToken};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Refresh token persistence, keyed by the SHA-256 of the secret.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + Debug {
    async fn create(&self, token: &RefreshToken) -> Result<()>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;

    /// Flips `revoked` on a live row. Returns `true` only for the caller whose
    /// update changed the row, so concurrent revokes of one token have one winner.
    async fn revoke(&self, token_hash: &str) -> Result<bool>;

    /// Revokes every unrevoked token of `user_id`, returning how many changed.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Deletes rows that expired or were revoked before `cutoff`.
    async fn purge(&self, cutoff: OffsetDateTime) -> Result<u64>;
}

/// The ledger of issued refresh tokens. Callers hand it plaintext secrets;
/// only their hashes go further.
#[derive(Clone, Debug)]
pub struct RefreshTokenService {
    repo: Arc<dyn RefreshTokenRepository>,
}

impl RefreshTokenService {
    #[must_use]
    pub fn new(repo: Arc<dyn RefreshTokenRepository>) -> Self {
        Self { repo }
    }

    /// Persists a new entry for `secret`.
    ///
    /// # Errors
    /// Propagates repository failures.
    #[tracing::instrument(level = "debug", skip(self, secret), fields(user.id = %user_id), err)]
    pub async fn create(&self, user_id: Uuid, secret: &str, ttl: time::Duration) -> Result<RefreshToken> {
        let entry = RefreshToken::new(user_id, OpaqueToken::hash(secret), ttl);
        self.repo.create(&entry).await?;
        Ok(entry)
    }

    /// Raw lookup, whatever the entry's state.
    ///
    /// # Errors
    /// `TokenInvalid` when no entry matches.
    pub async fn lookup(&self, secret: &str) -> Result<RefreshToken> {
        self.repo.find_by_hash(&OpaqueToken::hash(secret)).await?.ok_or(AppError::TokenInvalid)
    }

    /// Lookup that classifies the entry.
    ///
    /// # Errors
    /// `TokenInvalid` (unknown), `TokenExpired`, or `TokenRevoked`. Expiry is
    /// checked first, so replaying a stale token is never reported as reuse.
    pub async fn find_by_secret(&self, secret: &str) -> Result<RefreshToken> {
        let entry = self.lookup(secret).await?;
        if entry.is_expired() {
            return Err(AppError::TokenExpired);
        }
        if entry.is_revoked() {
            return Err(AppError::TokenRevoked);
        }
        Ok(entry)
    }

    /// Revokes the entry for `secret`.
    ///
    /// # Errors
    /// `TokenRevoked` when someone else already revoked it.
    #[tracing::instrument(level = "debug", skip(self, secret), err(level = "debug"))]
    pub async fn revoke(&self, secret: &str) -> Result<()> {
        self.revoke_hash(&OpaqueToken::hash(secret)).await
    }

    /// # Errors
    /// `TokenRevoked` when someone else already revoked it.
    pub async fn revoke_entry(&self, entry: &RefreshToken) -> Result<()> {
        self.revoke_hash(&entry.token_hash).await
    }

    async fn revoke_hash(&self, token_hash: &str) -> Result<()> {
        if self.repo.revoke(token_hash).await? { Ok(()) } else { Err(AppError::TokenRevoked) }
    }

    /// # Errors
    /// Propagates repository failures.
    #[tracing::instrument(level = "debug", skip(self), fields(user.id = %user_id), err)]
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.repo.revoke_all_for_user(user_id).await
    }

    /// # Errors
    /// Propagates repository failures.
    pub async fn purge(&self, cutoff: OffsetDateTime) -> Result<u64> {
        self.repo.purge(cutoff).await
    }
}
