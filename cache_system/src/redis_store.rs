//! Redis-backed key-value store
//!
//! Wraps a multiplexed async connection that is opened lazily and cached,
//! and re-opened against a new database on `select`.

use crate::errors::CacheError;
use crate::store::{KeyTtl, KeyValueStore};
use async_trait::async_trait;
use config::CacheConfig;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::RwLock;

/// Deletes every key matching ARGV[1] in one server-side step.
/// DEL is issued in batches to stay under Lua's unpack limit.
const DELETE_MATCHING_SCRIPT: &str = r#"
local keys = redis.call('KEYS', ARGV[1])
for i = 1, #keys, 5000 do
    redis.call('DEL', unpack(keys, i, math.min(i + 4999, #keys)))
end
return #keys
"#;

struct RedisState {
    client: Client,
    connection: Option<MultiplexedConnection>,
}

/// Redis connection bound to one logical database
pub struct RedisStore {
    state: RwLock<RedisState>,
    connection_timeout: Duration,
    script: redis::Script,
}

impl Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (database, connection_status) = match self.state.try_read() {
            Ok(state) => (
                Some(state.client.get_connection_info().redis.db),
                if state.connection.is_some() {
                    "connected"
                } else {
                    "no_connection"
                },
            ),
            Err(_) => (None, "lock_error"),
        };

        f.debug_struct("RedisStore")
            .field("database", &database)
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisStore {
    /// Create a store from configuration; no connection is opened yet
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut info = config.redis_url.as_str().into_connection_info()?;
        info.redis.db = config.database;
        let client = Client::open(info)?;

        Ok(Self {
            state: RwLock::new(RedisState {
                client,
                connection: None,
            }),
            connection_timeout: config.connection_timeout(),
            script: redis::Script::new(DELETE_MATCHING_SCRIPT),
        })
    }

    /// Get or create Redis connection
    async fn get_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut state = self.state.write().await;

        if let Some(connection) = state.connection.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.open(&state.client).await?;
        state.connection = Some(connection.clone());
        Ok(connection)
    }

    async fn open(&self, client: &Client) -> Result<MultiplexedConnection, CacheError> {
        tokio::time::timeout(
            self.connection_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(CacheError::from)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn select(&self, database: i64) -> Result<(), CacheError> {
        if database < 0 {
            return Err(CacheError::InvalidDatabase(database));
        }

        let mut state = self.state.write().await;
        let mut info = state.client.get_connection_info().clone();
        info.redis.db = database;

        // The database is part of the connection info so reconnects keep it,
        // including when this first connect fails
        state.client = Client::open(info)?;
        state.connection = None;
        let connection = self.open(&state.client).await?;
        state.connection = Some(connection);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CacheError> {
        let seconds =
            i64::try_from(seconds).map_err(|_| CacheError::TtlOutOfRange(seconds))?;
        let mut conn = self.get_connection().await?;
        let updated: bool = conn.expire(key, seconds).await?;
        Ok(updated)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        let mut conn = self.get_connection().await?;
        let reply: i64 = conn.ttl(key).await?;
        Ok(KeyTtl::from_reply(reply))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_connection().await?;
        let deleted: u64 = conn.del(keys.to_vec()).await?;
        Ok(deleted)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        let deleted: u64 = self.script.arg(pattern).invoke_async(&mut conn).await?;
        Ok(deleted)
    }

    async fn db_size(&self) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        let size: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }

    async fn ping(&self) -> Result<String, CacheError> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_does_not_connect() {
        let config = CacheConfig::new("redis://localhost:6379".to_string(), 4, 60);
        let store = RedisStore::new(&config).unwrap();

        let debug = format!("{:?}", store);
        assert!(debug.contains("no_connection"));
        assert!(debug.contains("database: Some(4)"));
    }

    #[test]
    fn test_new_rejects_malformed_url() {
        let config = CacheConfig::new("not a url".to_string(), 1, 60);
        assert!(matches!(RedisStore::new(&config), Err(CacheError::Redis(_))));
    }

    #[tokio::test]
    async fn test_select_sticks_when_server_unreachable() {
        let config = CacheConfig::new("redis://127.0.0.1:1".to_string(), 1, 60)
            .with_connection_timeout(500);
        let store = RedisStore::new(&config).unwrap();

        assert!(store.select(5).await.is_err());

        let debug = format!("{:?}", store);
        assert!(debug.contains("database: Some(5)"));
        assert!(debug.contains("no_connection"));
    }
}
