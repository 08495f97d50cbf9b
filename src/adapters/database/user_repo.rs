use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::credential_service::UserRepository;
use async_trait::async_trait;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, role, status, deleted_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn into_user(record: UserRecord) -> Result<User> {
    let id = record.id;
    User::try_from(record).map_err(|e| {
        tracing::error!(user.id = %id, error = %e, "Corrupt user row");
        AppError::Internal
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    /// `email` is already normalized; rows are matched case-insensitively.
    #[tracing::instrument(level = "debug", skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        record.map(into_user).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(into_user).transpose()
    }
}
