//! Caller-facing results.

use crate::structured::RecoveryQuality;
use crate::types::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Fresh upstream call made by this request.
    Upstream,
    /// Served from the cache store.
    Cache,
    /// Shared result of a concurrent identical request's upstream call.
    Coalesced,
}

/// Result of a single gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub endpoint: Endpoint,
    pub data: Value,
    pub source: ResponseSource,
    /// Recovery quality for endpoints whose output is parsed from text.
    pub quality: Option<RecoveryQuality>,
}

impl GatewayResponse {
    /// True when no upstream call was made on behalf of this request.
    pub fn cached(&self) -> bool {
        !matches!(self.source, ResponseSource::Upstream)
    }

    pub fn is_degraded(&self) -> bool {
        self.quality.map(|q| q.is_degraded()).unwrap_or(false)
    }

    /// `{ ...endpointSpecificFields, cached }`. Non-object data is placed under `result`.
    pub fn to_caller_json(&self) -> Value {
        let mut out = match &self.data {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("result".into(), other.clone());
                map
            }
        };
        out.insert("cached".into(), Value::Bool(self.cached()));
        Value::Object(out)
    }
}

/// Outcome of `clear_by_pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResult {
    pub keys_cleared: usize,
    pub pattern: String,
}
