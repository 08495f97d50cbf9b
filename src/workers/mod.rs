pub mod refresh_token_cleanup;

pub use refresh_token_cleanup::RefreshTokenCleanupWorker;
