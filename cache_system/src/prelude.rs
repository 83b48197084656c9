//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::client::CacheClient;
pub use crate::errors::CacheError;
pub use crate::memory::InMemoryStore;
pub use crate::options::CacheOptions;
pub use crate::redis_store::RedisStore;
pub use crate::store::{KeyTtl, KeyValueStore};
pub use crate::value::CachedValue;

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use async_trait::async_trait;
pub use redis;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
