use crate::domain::auth::Password;
use crate::domain::user::{Role, User, UserStatus, normalize_email};
use crate::error::Result;
use crate::services::credential_service::UserRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: DashMap<Uuid, User>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Creates an active user with `password` hashed.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn seed(&self, email: &str, password: &str, role: Role) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::now_v7(),
            email: email.to_string(),
            password_hash: Password::hash(password)?,
            role,
            status: UserStatus::Active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(user.clone());
        Ok(user)
    }

    pub fn set_status(&self, id: Uuid, status: UserStatus) {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.status = status;
            user.updated_at = OffsetDateTime::now_utc();
        }
    }

    pub fn soft_delete(&self, id: Uuid) {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.deleted_at = Some(OffsetDateTime::now_utc());
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.deleted_at.is_none() && normalize_email(&u.email) == email)
            .map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).filter(|u| u.deleted_at.is_none()).map(|u| u.value().clone()))
    }
}
