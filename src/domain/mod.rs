pub mod auth;
pub mod auth_session;
pub mod rate_limit;
pub mod request;
pub mod user;
