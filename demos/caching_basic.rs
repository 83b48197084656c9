//! # Basic Caching Example
//!
//! This example walks through the cache client against a local Redis:
//! - Building a client from configuration
//! - Writing plain and JSON values with default and custom TTLs
//! - Reading values back
//! - The three ways to evict: explicit keys, tracked keys, and patterns
//!
//! Start Redis first: docker run -d --name redis -p 6379:6379 redis:7-alpine

use cachehaus::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct Product {
    id: u32,
    name: String,
    price: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 CacheHaus Basic Caching Example");
    println!("==================================");

    // 1. Cache Setup
    let config = CacheConfig::new(
        "redis://localhost:6379".to_string(),
        2,  // database
        30, // default TTL: 30 seconds
    );

    let mut cache = CacheHaus::new(config)?;
    let client = cache.default_client()?;

    match client.ping().await {
        Ok(_) => println!("✅ Redis connection healthy"),
        Err(e) => {
            println!("❌ Redis connection failed: {}", e);
            println!("💡 Please start Redis: docker run -d --name redis -p 6379:6379 redis:7-alpine");
            return Ok(());
        }
    }

    // 2. Writes
    println!("\n📦 Writing Values");
    println!("-----------------");

    client
        .set("greeting", "hello")
        .set("user:1", json!({"id": 1, "name": "Ada"}).to_string())
        .set_with_ttl("config:flags", r#"["beta","dark-mode"]"#, None)
        .set_with_ttl("session:abc", "token", Some(Duration::from_secs(5)))
        .set_with_ttl("session:def", "token", Some(Duration::from_secs(5)));

    client.set_json(
        "product:1",
        &Product {
            id: 1,
            name: "Wireless Mouse".to_string(),
            price: 2999,
        },
    )?;

    println!("✅ Tracked keys: {:?}", client.cached_keys());

    // 3. Reads
    println!("\n🔎 Reading Values");
    println!("-----------------");

    println!("greeting     → {:?}", client.get("greeting").await);
    println!("user:1       → {:?}", client.get("user:1").await);
    println!("config:flags → {:?}", client.get("config:flags").await);
    println!("missing      → {:?}", client.get("missing").await);

    if let Some(product) = client.get_json::<Product>("product:1").await? {
        println!("product:1    → {} at ${:.2}", product.name, product.price as f64 / 100.0);
    }

    println!("user:1 TTL   → {:?}", client.time_to_live("user:1").await?);
    println!("flags TTL    → {:?}", client.time_to_live("config:flags").await?);
    println!("keys in db   → {}", client.count().await?);

    // 4. Eviction
    println!("\n🔄 Eviction");
    println!("-----------");

    let removed = client.delete_matching("session:*").await?;
    println!("Pattern 'session:*' removed {} keys", removed);

    client.delete_keys(["greeting"]);
    println!("After delete_keys: {:?}", client.cached_keys());

    client.flush_tracked();
    let failures = client.wait_pending().await;
    if failures.is_empty() {
        println!("✅ Tracked keys flushed, {} keys left in db", client.count().await?);
    } else {
        for failure in failures {
            println!("❌ {}", failure);
        }
    }

    println!("\n🎉 Basic Caching Demo Complete!");
    Ok(())
}
