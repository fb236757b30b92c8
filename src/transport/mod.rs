//! Upstream generative backend interface.
//!
//! The gateway only ever talks to the backend through [`Upstream`]; timeouts,
//! retries and cancellation are applied around `call`, so implementations must
//! be cancel-safe (dropping the future abandons the request).

mod http;

pub use http::{HttpUpstream, UpstreamConfig};

use crate::types::Endpoint;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Raw reply from the backend: free text, plus the JSON body when the transport had one.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub text: String,
    pub body: Option<Value>,
}

impl UpstreamReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Length of the meaningful output, used to reject structurally insufficient replies.
    pub fn content_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<UpstreamReply>;
    fn name(&self) -> &'static str;
}
