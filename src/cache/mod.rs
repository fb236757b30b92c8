//! 响应缓存模块：缓存策略、稳定缓存键与可插拔存储后端。
//!
//! # Response Caching Module
//!
//! Decides what to cache and for how long, derives stable keys from arbitrary
//! structured requests, and stores entries in a pluggable TTL store.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyDeriver`] | Deterministic `<namespace>:<endpoint>:<sha256>` keys |
//! | [`CachePolicy`] | Per-endpoint cacheability and TTL table |
//! | [`CacheStore`] | Trait for TTL key-value stores with pattern delete |
//! | [`MemoryCache`] | In-process LRU store |
//! | [`NullCache`] | No-op store for disabling caching |
//! | [`CacheManager`] | Typed JSON access with hit/miss statistics |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway::cache::{CacheConfig, CacheManager, CachePolicy, KeyDeriver, MemoryCache};
//! use ai_gateway::types::Endpoint;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let deriver = KeyDeriver::new();
//! let key = deriver.derive(Endpoint::Chat, &json!({"message": "hi"}), "user-1");
//! assert!(key.as_str().starts_with("ai_cache:chat:"));
//!
//! let ttl = CachePolicy::new().ttl(Endpoint::Chat);
//! let cache = CacheManager::new(CacheConfig::default(), Arc::new(MemoryCache::new(1000)));
//! # let _ = (ttl, cache);
//! ```

mod backend;
mod key;
mod manager;
mod policy;
#[cfg(feature = "redis")]
mod redis_store;

pub use backend::{CacheStore, MemoryCache, NullCache};
pub use key::{CacheKey, KeyDeriver, DEFAULT_NAMESPACE};
pub use manager::{CacheConfig, CacheManager, CacheStats};
pub use policy::{CachePolicy, DEFAULT_TTL_SECS};
#[cfg(feature = "redis")]
pub use redis_store::RedisCache;
