//! Key-value store abstraction
//!
//! The cache client talks to its backing store only through this trait, which
//! covers the handful of commands it needs: database selection, string
//! GET/SET, EXPIRE/TTL, KEYS/DEL, DBSIZE and an atomic delete-by-pattern.

use crate::errors::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist
    Missing,
    /// The key exists without an expiration
    Persistent,
    /// The key expires after the given duration
    Expires(Duration),
}

impl KeyTtl {
    /// Decode a `TTL` reply: -2 for a missing key, -1 for no expiration
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            r if r < 0 => Self::Persistent,
            seconds => Self::Expires(Duration::from_secs(seconds as u64)),
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Commands a cache client needs from its store.
///
/// One store value represents one connection bound to one selected database.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Bind this connection to a logical database
    async fn select(&self, database: i64) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Set a key's expiration in seconds; `false` when the key does not exist
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CacheError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError>;

    /// List keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Atomically delete every key matching a glob pattern
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Number of keys in the selected database
    async fn db_size(&self) -> Result<u64, CacheError>;

    async fn ping(&self) -> Result<String, CacheError>;
}
