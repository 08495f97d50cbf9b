pub mod challenge;
pub mod database;
pub mod memory;
pub mod redis;
