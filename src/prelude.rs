//! Convenience re-exports for common CacheHaus usage
//!
//! This prelude module re-exports the most commonly used items from the CacheHaus crates,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use cachehaus::prelude::*;
//!
//! // Now you have access to all the common CacheHaus types
//! let options = CacheOptions::default();
//! assert_eq!(options.database, 1);
//! ```

// Core CacheHaus components
pub use crate::core::CacheHaus;
pub use crate::errors::CacheHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, ConfigError};

// Re-export cache system
pub use cache_system::prelude::*;
pub use cache_system::KeyTracker;

// Common external dependencies
pub use anyhow;
