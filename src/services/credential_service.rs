use crate::domain::auth::Password;
use crate::domain::user::{User, normalize_email};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identity persistence. Soft-deleted users are never returned.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Case-insensitive lookup; `email` is already normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("User not found")]
    NotFound,
    #[error("Password mismatch")]
    Mismatch,
    #[error("User store failure: {0}")]
    Store(#[source] AppError),
    #[error("Password verifier failure: {0}")]
    Verifier(#[source] AppError),
}

impl CredentialError {
    /// Audit label for the branch taken. Never shown to callers.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "user_not_found",
            Self::Mismatch => "password_mismatch",
            Self::Store(_) => "store_error",
            Self::Verifier(_) => "verifier_error",
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound | CredentialError::Mismatch => Self::InvalidCredentials,
            CredentialError::Store(e) | CredentialError::Verifier(e) => e,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CredentialService {
    users: Arc<dyn UserRepository>,
}

impl CredentialService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// # Errors
    /// `NotFound` when no live user has this email, `Store` when the lookup itself failed.
    #[tracing::instrument(level = "debug", skip(self, identifier), err(level = "debug"))]
    pub async fn find_by_identifier(&self, identifier: &str) -> std::result::Result<User, CredentialError> {
        let email = normalize_email(identifier);
        self.users.find_by_email(&email).await.map_err(CredentialError::Store)?.ok_or(CredentialError::NotFound)
    }

    /// # Errors
    /// `NotFound` when the id is unknown or soft-deleted, `Store` on lookup failure.
    #[tracing::instrument(level = "debug", skip(self), err(level = "debug"))]
    pub async fn find_by_id(&self, id: Uuid) -> std::result::Result<User, CredentialError> {
        self.users.find_by_id(id).await.map_err(CredentialError::Store)?.ok_or(CredentialError::NotFound)
    }

    /// Runs the slow hash comparison off the async runtime.
    ///
    /// # Errors
    /// `Mismatch` when the password is wrong, `Verifier` when the hash could not be checked.
    #[tracing::instrument(level = "debug", skip(self, user, password), fields(user.id = %user.id), err(level = "debug"))]
    pub async fn verify_password(&self, user: &User, password: &str) -> std::result::Result<(), CredentialError> {
        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| CredentialError::Verifier(AppError::Internal))?
            .map_err(CredentialError::Verifier)?;

        if matches { Ok(()) } else { Err(CredentialError::Mismatch) }
    }
}
