//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! during cache operations and key-value store interactions.

use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timeout")]
    Timeout,

    #[error("Invalid database index: {0}")]
    InvalidDatabase(i64),

    #[error("Cache worker has stopped")]
    WorkerStopped,

    #[error("Cache command panicked")]
    CommandPanicked,

    #[error("TTL out of range: {0}s")]
    TtlOutOfRange(u64),

    #[error("No Tokio runtime to run the cache worker on")]
    NoRuntime,

    #[error("General cache error: {0}")]
    General(String),
}
