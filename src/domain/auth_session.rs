use crate::domain::user::UserSummary;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub user: UserSummary,
}

/// Result of a successful refresh. The presented refresh token is spent; `refresh_token` replaces it.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: String,
    pub access_ttl_secs: u64,
    pub refresh_token: String,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutScope {
    /// One refresh token revoked.
    Session,
    /// Every refresh token of the user revoked; carries how many were still live.
    Everywhere { revoked: u64 },
}
