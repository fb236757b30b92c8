//! 用量账本模块：按用户、按天记录调用并计算缓存节省。
//!
//! # Usage Ledger Module
//!
//! Per-user, per-day accounting of every gateway call, cached or not, with
//! rolling-window analytics and cache-hit savings.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`UsageLedger`] | `record` / `summarize` over day buckets |
//! | [`UsageStore`] | Trait for `(user, day)`-keyed append-only persistence |
//! | [`MemoryUsageStore`] | In-process store with per-bucket retention |
//! | [`CostEstimator`] | Per-endpoint cost estimate from payload and output size |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway::types::Endpoint;
//! use ai_gateway::usage::{MemoryUsageStore, UsageLedger};
//! use std::sync::Arc;
//!
//! # async fn run() -> ai_gateway::Result<()> {
//! let ledger = UsageLedger::new(Arc::new(MemoryUsageStore::new()));
//! ledger.record("user-1", Endpoint::Chat, false, 0.002).await?;
//! ledger.record("user-1", Endpoint::Chat, true, 0.002).await?;
//!
//! let summary = ledger.summarize("user-1", 7).await?;
//! assert_eq!(summary.cache_hit_rate, 0.5);
//! # Ok(())
//! # }
//! ```

mod ledger;
mod pricing;
mod record;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

pub use ledger::{UsageLedger, DEFAULT_RETENTION_DAYS};
pub use pricing::{CharacterEstimator, CostEstimate, CostEstimator, EndpointPricing, TokenCounter};
pub use record::{EndpointUsage, UsageRecord, UsageSummary};
#[cfg(feature = "redis")]
pub use redis_store::RedisUsageStore;
pub use store::{MemoryUsageStore, UsageStore};
