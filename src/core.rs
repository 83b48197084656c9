//! Core CacheHaus functionality
//!
//! This module contains the CacheHaus struct, the application-level factory
//! that builds one cache client per logical database and hands it out to the
//! rest of the application.

use cache_system::{CacheClient, CacheOptions, InMemoryStore, KeyValueStore, RedisStore};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CacheHausError;
use crate::{debug_log, trace_log};
use config::{AppConfig, CacheConfig};

/// Where new client connections come from
#[derive(Debug)]
enum Backend {
    Redis,
    Memory(InMemoryStore),
}

/// Main CacheHaus coordinator that owns the cache clients of an application
#[derive(Debug)]
pub struct CacheHaus {
    config: CacheConfig,
    backend: Backend,
    clients: HashMap<i64, CacheClient>,
}

impl CacheHaus {
    /// Create a CacheHaus backed by the Redis server in `config`.
    ///
    /// Connections are opened lazily, per client.
    pub fn new(config: CacheConfig) -> Result<Self, CacheHausError> {
        config.validate()?;
        Ok(Self {
            config,
            backend: Backend::Redis,
            clients: HashMap::new(),
        })
    }

    /// Create a CacheHaus from a loaded application configuration
    pub fn from_app_config(config: AppConfig) -> Result<Self, CacheHausError> {
        Self::new(config.cache)
    }

    /// Create a CacheHaus whose clients share an in-process store
    pub fn in_memory(config: CacheConfig, store: InMemoryStore) -> Self {
        Self {
            config,
            backend: Backend::Memory(store),
            clients: HashMap::new(),
        }
    }

    /// Get configuration reference
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Client for the configured database, created on first use
    pub fn default_client(&mut self) -> Result<CacheClient, CacheHausError> {
        self.client(self.config.database)
    }

    /// Client for `database`, created on first use.
    ///
    /// Creating a client outside a Tokio runtime fails with `CacheError::NoRuntime`.
    pub fn client(&mut self, database: i64) -> Result<CacheClient, CacheHausError> {
        if let Some(client) = self.clients.get(&database) {
            trace_log!("Reusing cache client for database {}", database);
            return Ok(client.clone());
        }

        let client = self.build_client(database)?;
        debug_log!("Created cache client for database {}", database);
        self.clients.insert(database, client.clone());
        Ok(client)
    }

    fn build_client(&self, database: i64) -> Result<CacheClient, CacheHausError> {
        let store: Arc<dyn KeyValueStore> = match &self.backend {
            Backend::Redis => {
                let config = CacheConfig {
                    database,
                    ..self.config.clone()
                };
                Arc::new(RedisStore::new(&config)?)
            }
            Backend::Memory(store) => Arc::new(store.connect()),
        };

        let options = CacheOptions::from(&self.config).with_database(database);
        CacheClient::new(store, options).map_err(CacheHausError::from)
    }

    /// Register an externally built client for a database
    pub fn register_client(&mut self, client: CacheClient) -> Result<(), CacheHausError> {
        let database = client.database();
        if self.clients.contains_key(&database) {
            return Err(CacheHausError::ClientAlreadyRegistered(database));
        }

        self.clients.insert(database, client);
        Ok(())
    }

    /// Get an existing client without creating one
    pub fn get_client(&self, database: i64) -> Result<&CacheClient, CacheHausError> {
        self.clients
            .get(&database)
            .ok_or(CacheHausError::ClientNotFound(database))
    }

    /// List databases that have a client
    pub fn databases(&self) -> Vec<i64> {
        let mut databases: Vec<i64> = self.clients.keys().copied().collect();
        databases.sort_unstable();
        databases
    }

    /// Remove a client by database
    pub fn unregister_client(&mut self, database: i64) -> Result<CacheClient, CacheHausError> {
        self.clients
            .remove(&database)
            .ok_or(CacheHausError::ClientNotFound(database))
    }

    /// Check store connectivity through every registered client
    pub async fn health_check(&self) -> Result<(), CacheHausError> {
        for client in self.clients.values() {
            client.ping().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory() -> CacheHaus {
        CacheHaus::in_memory(CacheConfig::default(), InMemoryStore::new())
    }

    #[test]
    fn test_new_validates_config() {
        let config = CacheConfig::new(String::new(), 1, 60);
        assert!(matches!(
            CacheHaus::new(config),
            Err(CacheHausError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_client_is_created_once_per_database() {
        let mut haus = in_memory();
        let first = haus.client(2).unwrap();
        first.set("k", "v");

        let second = haus.client(2).unwrap();
        assert_eq!(second.cached_keys(), vec!["k"]);
        assert_eq!(haus.databases(), vec![2]);
    }

    #[tokio::test]
    async fn test_default_client_uses_configured_database() {
        let config = CacheConfig::new("redis://localhost".to_string(), 3, 30);
        let mut haus = CacheHaus::in_memory(config, InMemoryStore::new());

        let client = haus.default_client().unwrap();
        assert_eq!(client.database(), 3);
        assert_eq!(client.default_ttl(), Some(std::time::Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_clients_on_different_databases_are_isolated() {
        let mut haus = in_memory();
        let one = haus.client(1).unwrap();
        let two = haus.client(2).unwrap();

        one.set("k", "one");
        assert_eq!(two.get("k").await, None);
        assert!(one.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let mut haus = in_memory();
        let client = CacheClient::new(
            Arc::new(InMemoryStore::new()),
            CacheOptions::default().with_database(5),
        )
        .unwrap();

        haus.register_client(client.clone()).unwrap();
        assert!(matches!(
            haus.register_client(client),
            Err(CacheHausError::ClientAlreadyRegistered(5))
        ));
        assert!(haus.get_client(5).is_ok());

        haus.unregister_client(5).unwrap();
        assert!(matches!(
            haus.get_client(5),
            Err(CacheHausError::ClientNotFound(5))
        ));
        assert!(matches!(
            haus.unregister_client(5),
            Err(CacheHausError::ClientNotFound(5))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut haus = in_memory();
        haus.client(1).unwrap();
        haus.client(2).unwrap();

        assert!(haus.health_check().await.is_ok());
    }
}
