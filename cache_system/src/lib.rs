//! Cache system for Redis-based caching
//!
//! This crate provides a cache client that layers TTL policy, JSON-aware
//! reads and bulk eviction of the keys it wrote on top of a key-value store.

pub mod client;
pub mod errors;
pub mod memory;
pub mod options;
pub mod pattern;
pub mod prelude;
pub mod redis_store;
pub mod store;
pub mod tracker;
pub mod value;

// Re-export centralized config
pub use config::CacheConfig;

pub use client::CacheClient;
pub use errors::CacheError;
pub use memory::InMemoryStore;
pub use options::CacheOptions;
pub use redis_store::RedisStore;
pub use store::{KeyTtl, KeyValueStore};
pub use tracker::KeyTracker;
pub use value::CachedValue;
