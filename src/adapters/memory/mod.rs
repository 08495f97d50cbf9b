//! In-process stores with the same semantics as the Postgres and Redis adapters.
//! Backed by `DashMap`, so single-key updates are atomic under the shard lock.

mod rate_limit_store;
mod refresh_token_repo;
mod user_repo;

pub use rate_limit_store::MemoryRateLimitStore;
pub use refresh_token_repo::MemoryRefreshTokenRepository;
pub use user_repo::MemoryUserRepository;
