pub mod audit;
pub mod challenge_service;
pub mod credential_service;
pub mod rate_limit_service;
pub mod refresh_token_service;
pub mod session_service;
pub mod token_service;
