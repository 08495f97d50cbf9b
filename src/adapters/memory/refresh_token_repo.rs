use crate::domain::auth::RefreshToken;
use crate::error::{AppError, Result};
use crate::services::refresh_token_service::RefreshTokenRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: DashMap<String, RefreshToken>,
}

impl MemoryRefreshTokenRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<()> {
        match self.tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(AppError::Internal),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        Ok(self.tokens.get(token_hash).map(|t| t.value().clone()))
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool> {
        let Some(mut token) = self.tokens.get_mut(token_hash) else {
            return Ok(false);
        };
        if token.revoked {
            return Ok(false);
        }
        token.revoked = true;
        token.revoked_at = Some(OffsetDateTime::now_utc());
        Ok(true)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut revoked = 0;
        for mut token in self.tokens.iter_mut() {
            if token.user_id == user_id && !token.revoked {
                token.revoked = true;
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let mut purged = 0;
        self.tokens.retain(|_, t| {
            let keep = t.expires_at >= cutoff && !t.revoked_at.is_some_and(|at| at < cutoff);
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
