//! 网关编排模块：缓存、重试、请求合并、响应恢复与用量记录的组合入口。
//!
//! # Gateway Module
//!
//! [`Gateway`] services one logical AI call end to end:
//!
//! 1. Validate the [`CallRequest`](crate::types::CallRequest).
//! 2. If the policy allows caching, derive the key and look it up.
//! 3. On a miss, join the in-flight call for the same key or lead a new one.
//! 4. Call upstream: escalating retries for generation endpoints, one fixed
//!    deadline otherwise.
//! 5. Recover structured content where the endpoint has an expected shape.
//! 6. Write through to the cache and append a usage record.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Gateway`] | The orchestrator, plus `clear_by_pattern` for operators |
//! | [`GatewayBuilder`] | Wires upstream, stores, policy, shapes and pricing |
//! | [`GatewayConfig`] | YAML/env configuration with validation |
//! | [`GatewayStatsSnapshot`] | Upstream calls, hits, coalesced, degraded, failures |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_gateway::gateway::{Gateway, GatewayConfig};
//! use ai_gateway::types::{CallRequest, Endpoint};
//! use serde_json::json;
//!
//! # async fn run() -> ai_gateway::Result<()> {
//! let gateway = Gateway::builder()
//!     .config(GatewayConfig::default().with_env_overrides()?)
//!     .build()?;
//!
//! let request = CallRequest::new(
//!     Endpoint::LessonGeneration,
//!     json!({"topic": "Fractions", "difficulty": "beginner"}),
//!     "user-42",
//! );
//! let response = gateway.invoke(request).await?;
//! println!("{}", response.to_caller_json());
//!
//! let cleared = gateway.clear_by_pattern("ai_cache:chat:*").await?;
//! println!("cleared {} keys", cleared.keys_cleared);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod core;
mod stats;

pub use builder::GatewayBuilder;
pub use config::GatewayConfig;
pub use core::Gateway;
pub use stats::{GatewayStats, GatewayStatsSnapshot};
