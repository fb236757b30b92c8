//! 弹性模块：递增超时重试与请求合并。
//!
//! # Resilience Module
//!
//! Keeps slow generative backends usable: retries under escalating deadlines
//! and collapses identical concurrent requests into a single upstream call.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RetryScheduler`] | Bounded attempts with strictly increasing per-attempt deadlines |
//! | [`RetryConfig`] | Deadlines, inter-attempt pause and minimum viable output length |
//! | [`SingleFlight`] | Leader/follower coalescing keyed by cache key |
//!
//! ## Escalating Timeouts
//!
//! ```rust
//! use ai_gateway::resilience::{RetryConfig, RetryScheduler};
//! use ai_gateway::transport::UpstreamReply;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> ai_gateway::Result<()> {
//! let scheduler = RetryScheduler::new(RetryConfig::default());
//! let reply = scheduler
//!     .call_with_escalating_timeout(&CancellationToken::new(), |_attempt, _deadline| async {
//!         Ok(UpstreamReply::text("a long enough generated lesson body for the viability check"))
//!     })
//!     .await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

mod retry;
mod single_flight;

pub use retry::{call_with_deadline, RetryConfig, RetryScheduler};
pub use single_flight::{FlightGuard, Follower, Join, SingleFlight};
