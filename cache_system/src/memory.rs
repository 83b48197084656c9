//! In-process key-value store
//!
//! Mirrors the subset of Redis behaviour the cache client relies on: several
//! logical databases, string values, per-key expiration and glob key
//! patterns. Expiration uses the Tokio clock so paused-time tests can step
//! past a TTL without sleeping.

use crate::errors::CacheError;
use crate::pattern::glob_match;
use crate::store::{KeyTtl, KeyValueStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

type Database = HashMap<String, Entry>;

/// Handle onto a shared in-memory dataset.
///
/// Each handle keeps its own selected database, like a Redis connection.
/// [`InMemoryStore::connect`] opens another handle over the same data.
#[derive(Debug)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<i64, Database>>>,
    selected: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            selected: AtomicI64::new(0),
        }
    }

    /// A new handle over the same data, starting on database 0
    pub fn connect(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            selected: AtomicI64::new(0),
        }
    }

    pub fn selected_database(&self) -> i64 {
        self.selected.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<i64, Database>>, CacheError> {
        self.data
            .lock()
            .map_err(|_| CacheError::General("in-memory store lock poisoned".to_string()))
    }

    /// Run `op` against the selected database after dropping expired keys
    fn with_database<T>(&self, op: impl FnOnce(&mut Database) -> T) -> Result<T, CacheError> {
        let mut data = self.lock()?;
        let database = data.entry(self.selected_database()).or_default();
        let now = Instant::now();
        database.retain(|_, entry| !entry.is_expired(now));
        Ok(op(database))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn select(&self, database: i64) -> Result<(), CacheError> {
        if database < 0 {
            return Err(CacheError::InvalidDatabase(database));
        }
        self.selected.store(database, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_database(|db| db.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        // Like SET, a write clears any previous expiration
        self.with_database(|db| {
            db.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
        })
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CacheError> {
        self.with_database(|db| -> Result<bool, CacheError> {
            if seconds == 0 {
                return Ok(db.remove(key).is_some());
            }
            match db.get_mut(key) {
                Some(entry) => {
                    let expires_at = Instant::now()
                        .checked_add(Duration::from_secs(seconds))
                        .ok_or(CacheError::TtlOutOfRange(seconds))?;
                    entry.expires_at = Some(expires_at);
                    Ok(true)
                }
                None => Ok(false),
            }
        })?
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        self.with_database(|db| match db.get(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(expires),
                ..
            }) => KeyTtl::Expires(expires.saturating_duration_since(Instant::now())),
        })
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.with_database(|db| {
            db.keys()
                .filter(|key| glob_match(pattern, key))
                .cloned()
                .collect()
        })
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.with_database(|db| keys.iter().filter(|key| db.remove(*key).is_some()).count() as u64)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        self.with_database(|db| {
            let before = db.len();
            db.retain(|key, _| !glob_match(pattern, key));
            (before - db.len()) as u64
        })
    }

    async fn db_size(&self) -> Result<u64, CacheError> {
        self.with_database(|db| db.len() as u64)
    }

    async fn ping(&self) -> Result<String, CacheError> {
        Ok("PONG".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let store = InMemoryStore::new();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_databases_are_isolated() {
        let store = InMemoryStore::new();
        store.set("k", "db0").await.unwrap();
        store.select(3).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.db_size().await.unwrap(), 0);

        store.select(0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("db0".to_string()));
    }

    #[tokio::test]
    async fn test_connections_share_data_but_not_selection() {
        let store = InMemoryStore::new();
        store.select(2).await.unwrap();
        store.set("shared", "yes").await.unwrap();

        let other = store.connect();
        assert_eq!(other.selected_database(), 0);
        assert_eq!(other.get("shared").await.unwrap(), None);

        other.select(2).await.unwrap();
        assert_eq!(other.get("shared").await.unwrap(), Some("yes".to_string()));
    }

    #[tokio::test]
    async fn test_negative_database_is_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.select(-1).await,
            Err(CacheError::InvalidDatabase(-1))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiration() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert!(store.expire("k", 10).await.unwrap());
        assert_eq!(
            store.ttl("k").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(10))
        );

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Missing);
        assert_eq!(store.db_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expire_missing_key_and_zero_ttl() {
        let store = InMemoryStore::new();
        assert!(!store.expire("missing", 10).await.unwrap());

        store.set("k", "v").await.unwrap();
        assert!(store.expire("k", 0).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_clears_expiration() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.expire("k", 5).await.unwrap();
        store.set("k", "v2").await.unwrap();

        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_keys_del_and_delete_matching() {
        let store = InMemoryStore::new();
        for key in ["ns:1", "ns:2", "other:1"] {
            store.set(key, "v").await.unwrap();
        }

        let mut keys = store.keys("ns:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ns:1", "ns:2"]);

        let deleted = store
            .del(&["ns:1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        assert_eq!(store.delete_matching("ns:*").await.unwrap(), 1);
        assert_eq!(store.keys("*").await.unwrap(), vec!["other:1"]);
    }

    #[tokio::test]
    async fn test_expire_out_of_range_is_an_error() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();

        assert!(matches!(
            store.expire("k", u64::MAX).await,
            Err(CacheError::TtlOutOfRange(u64::MAX))
        ));
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Persistent);
    }
}
