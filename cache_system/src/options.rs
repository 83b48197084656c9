//! Construction options for a cache client
//!
//! This module defines the CacheOptions struct and the TTL
//! normalization rules shared by every write path.

use config::{CacheConfig, DEFAULT_DATABASE, DEFAULT_TTL_SECONDS};
use std::time::Duration;

/// Options a `CacheClient` is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Logical database to select
    pub database: i64,
    /// TTL applied when a write does not carry its own; `None` never expires
    pub default_ttl: Option<Duration>,
}

impl CacheOptions {
    pub fn new(database: i64, default_ttl: Option<Duration>) -> Self {
        Self {
            database,
            default_ttl: normalize_ttl(default_ttl),
        }
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = normalize_ttl(Some(ttl));
        self
    }

    /// Keys written without an explicit TTL persist until deleted
    pub fn without_expiration(mut self) -> Self {
        self.default_ttl = None;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new(
            DEFAULT_DATABASE,
            Some(Duration::from_secs(DEFAULT_TTL_SECONDS)),
        )
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.database, config.ttl_duration())
    }
}

/// A zero TTL means "no expiration"
pub fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

/// Whole seconds for EXPIRE, rounding sub-second remainders up
pub fn ttl_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        seconds.saturating_add(1)
    } else {
        seconds
    }
}
