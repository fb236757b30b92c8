//! # ai-gateway
//!
//! 面向生成式 AI 后端的弹性与缓存层：缓存策略、稳定缓存键、用量统计、递增超时重试与响应恢复。
//!
//! Resilience and caching layer that fronts an unreliable generative-AI backend.
//!
//! ## Overview
//!
//! Every AI call (chat, image analysis, voice analysis, lesson generation) goes
//! through one [`Gateway`]. It decides what may be cached and for how long,
//! derives stable keys from arbitrary structured requests, coalesces identical
//! concurrent misses, retries slow generation calls under escalating deadlines,
//! recovers usable JSON from malformed replies and keeps a per-user usage ledger.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_gateway::{CallRequest, Endpoint, Gateway};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ai_gateway::Result<()> {
//!     let gateway = Gateway::builder().build()?;
//!
//!     let request = CallRequest::new(
//!         Endpoint::Chat,
//!         json!({"message": "What is a fraction?"}),
//!         "user-42",
//!     );
//!     let response = gateway.invoke(request).await?;
//!     println!("cached={} {}", response.cached(), response.to_caller_json());
//!
//!     let usage = gateway.summarize("user-42", 7).await?;
//!     println!("hit rate {:.2}", usage.cache_hit_rate);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`gateway`] | Orchestrator, builder, configuration and counters |
//! | [`cache`] | Key derivation, cache policy, pluggable TTL stores |
//! | [`usage`] | Day-bucketed usage ledger and cost estimation |
//! | [`resilience`] | Escalating-timeout retries and single-flight coalescing |
//! | [`structured`] | Expected shapes and defensive response recovery |
//! | [`transport`] | Upstream trait and the HTTP implementation |
//! | [`types`] | Endpoints, requests and caller-facing responses |

pub mod cache;
pub mod gateway;
pub mod resilience;
pub mod structured;
pub mod transport;
pub mod types;
pub mod usage;
pub mod utils;

// Re-export main types for convenience
pub use gateway::{Gateway, GatewayBuilder, GatewayConfig};
pub use structured::{ExpectedShape, RecoveryQuality};
pub use types::{CallRequest, ClearResult, Endpoint, GatewayResponse, ResponseSource};
pub use usage::UsageSummary;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
