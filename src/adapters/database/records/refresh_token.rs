use crate::domain::auth::RefreshToken;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) token_hash: String,
    pub(crate) expires_at: OffsetDateTime,
    pub(crate) revoked: bool,
    pub(crate) revoked_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
}

impl From<RefreshTokenRecord> for RefreshToken {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            token_hash: record.token_hash,
            expires_at: record.expires_at,
            revoked: record.revoked,
            revoked_at: record.revoked_at,
            created_at: record.created_at,
        }
    }
}
