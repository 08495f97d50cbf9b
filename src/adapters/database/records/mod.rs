pub mod refresh_token;
pub mod user;

pub use refresh_token::RefreshTokenRecord;
pub use user::UserRecord;
