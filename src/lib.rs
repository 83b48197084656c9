//! # CacheHaus
//!
//! A Redis cache client that adds JSON-aware reads, per-key TTL policy, and
//! bookkeeping of the keys it wrote so they can be evicted in bulk, along with
//! wildcard pattern deletion.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachehaus::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::new(
//!         "redis://localhost:6379".to_string(),
//!         2,  // database
//!         30, // default TTL in seconds
//!     );
//!
//!     let mut cache = CacheHaus::new(config)?;
//!     let client = cache.default_client()?;
//!
//!     client
//!         .set("user:1", r#"{"id":1}"#)
//!         .set_with_ttl("banner", "hello", Some(Duration::from_secs(5)));
//!
//!     if let Some(CachedValue::Json(user)) = client.get("user:1").await {
//!         println!("cached user: {}", user);
//!     }
//!
//!     let removed = client.delete_matching("session:*").await?;
//!     println!("removed {} sessions", removed);
//!
//!     client.flush_tracked();
//!     for failure in client.wait_pending().await {
//!         eprintln!("cache write failed: {}", failure);
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::CacheHaus;
pub use crate::errors::CacheHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig};

// Re-export internal crates used by the public API
pub use cache_system;
pub use config;

// Re-export external dependencies used in public API
pub use async_trait;
pub use redis;
