use crate::domain::user::{Role, User, UserStatus};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) role: String,
    pub(crate) status: String,
    pub(crate) deleted_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = String;
    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            email: record.email,
            password_hash: record.password_hash,
            role: record.role.parse::<Role>()?,
            status: record.status.parse::<UserStatus>()?,
            deleted_at: record.deleted_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
