//! 类型系统模块：定义网关调用的核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of a single gateway call: which endpoint is
//! being called, the caller's request, and the caller-facing result.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Endpoint`] | Logical category of AI call, each with its own cache policy |
//! | [`CallRequest`] | One invocation: endpoint, payload, user and media flags |
//! | [`GatewayResponse`] | Result data annotated with its source and recovery quality |
//! | [`ClearResult`] | Outcome of an operator-triggered cache invalidation |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway::types::{CallRequest, Endpoint};
//! use serde_json::json;
//!
//! let request = CallRequest::new(
//!     Endpoint::LessonGeneration,
//!     json!({"topic": "Fractions", "difficulty": "beginner"}),
//!     "user-42",
//! );
//! assert!(request.validate().is_ok());
//! ```

pub mod endpoint;
pub mod request;
pub mod response;

pub use endpoint::Endpoint;
pub use request::CallRequest;
pub use response::{ClearResult, GatewayResponse, ResponseSource};
