//! # Configuration Management for CacheHaus
//!
//! This crate provides the configuration structures shared by the CacheHaus
//! components: where the key-value store lives, which logical database to bind,
//! and the default time-to-live applied to written keys.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::CacheConfig;
//!
//! let cache_config = CacheConfig::new(
//!     "redis://localhost:6379".to_string(),
//!     2,    // database
//!     30,   // default_ttl_seconds (0 = never expire)
//! );
//! assert_eq!(cache_config.database, 2);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [cache]
//! redis_url = "redis://localhost:6379"
//! database = 1
//! default_ttl_seconds = 3600
//! connection_timeout_ms = 5000
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from the path in CACHEHAUS_CONFIG, or ./cachehaus.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path, str::FromStr, time::Duration};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./cachehaus.toml";
const CONFIG_PATH_ENV: &str = "CACHEHAUS_CONFIG";

/// Database selected when none is configured.
pub const DEFAULT_DATABASE: i64 = 1;
/// One hour.
pub const DEFAULT_TTL_SECONDS: u64 = 60 * 60;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5000;
/// Redis ships with 16 logical databases.
pub const MAX_DATABASE: i64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub cache: CacheConfig,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,

    /// Logical database the client binds to
    #[serde(default = "default_database")]
    pub database: i64,

    /// Default TTL for written keys in seconds; 0 disables expiration
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_database() -> i64 {
    DEFAULT_DATABASE
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

impl AppConfig {
    /// Load configuration from TOML file specified in .env or defaults
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine, the variable may come from the environment
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err.into());
            }
        }

        let config = if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified in .env file as {} or in {} file",
                CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH
            )))
        }?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()
    }
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new(redis_url: String, database: i64, default_ttl_seconds: u64) -> Self {
        Self {
            redis_url,
            database,
            default_ttl_seconds,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }

    pub fn with_connection_timeout(mut self, timeout_ms: u64) -> Self {
        self.connection_timeout_ms = timeout_ms;
        self
    }

    /// Default TTL as a Duration, `None` when keys should never expire
    pub fn ttl_duration(&self) -> Option<Duration> {
        match self.default_ttl_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Validate cache settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::Invalid(
                "Redis URL cannot be empty".to_string(),
            ));
        }
        if !["redis://", "rediss://", "unix://", "redis+unix://"]
            .iter()
            .any(|scheme| self.redis_url.starts_with(scheme))
        {
            return Err(ConfigError::Invalid(format!(
                "Redis URL has an unsupported scheme: {}",
                self.redis_url
            )));
        }
        if !(0..=MAX_DATABASE).contains(&self.database) {
            return Err(ConfigError::Invalid(format!(
                "Cache database must be between 0 and {}",
                MAX_DATABASE
            )));
        }
        if self.connection_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache connection_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(
            "redis://localhost:6379".to_string(),
            DEFAULT_DATABASE,
            DEFAULT_TTL_SECONDS,
        )
    }
}
