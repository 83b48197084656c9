//! Error types for the CacheHaus crate
//!
//! This module contains all error types that can be returned by CacheHaus operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheHausError {
    #[error("Cache error: {0}")]
    Cache(#[from] cache_system::CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No cache client for database {0}")]
    ClientNotFound(i64),

    #[error("Cache client already registered for database {0}")]
    ClientAlreadyRegistered(i64),
}
