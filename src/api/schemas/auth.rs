use crate::domain::auth_session::{AuthSession, LogoutScope, RefreshedSession};
use crate::domain::user::{Role, UserSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_TYPE: &str = "Bearer";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default)]
    pub challenge_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refresh {
    pub refresh_token: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Logout {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<UserSummary> for User {
    fn from(summary: UserSummary) -> Self {
        Self { id: summary.id, email: summary.email, role: summary.role }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub refresh_expires_in: u64,
    pub user: User,
}

impl From<AuthSession> for Session {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: session.access_ttl_secs,
            refresh_expires_in: session.refresh_ttl_secs,
            user: session.user.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refreshed {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub refresh_expires_in: u64,
}

impl From<RefreshedSession> for Refreshed {
    fn from(session: RefreshedSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: session.access_ttl_secs,
            refresh_expires_in: session.refresh_ttl_secs,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedOut {
    pub scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_sessions: Option<u64>,
}

impl From<LogoutScope> for LoggedOut {
    fn from(scope: LogoutScope) -> Self {
        match scope {
            LogoutScope::Session => Self { scope: "session", revoked_sessions: None },
            LogoutScope::Everywhere { revoked } => Self { scope: "everywhere", revoked_sessions: Some(revoked) },
        }
    }
}
