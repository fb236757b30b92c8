//! Per-endpoint cacheability and TTL.

use crate::types::{CallRequest, Endpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// TTL for endpoint names the policy does not recognize.
pub const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Per-endpoint TTL overrides in seconds; endpoints not listed use the built-in table.
    #[serde(default)]
    pub ttl_overrides: BTreeMap<Endpoint, u64>,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self {
            ttl_overrides: BTreeMap::new(),
        }
    }

    pub fn with_ttl(mut self, endpoint: Endpoint, secs: u64) -> Self {
        self.ttl_overrides.insert(endpoint, secs);
        self
    }

    /// Whether a response for this request may be written to and served from the cache.
    ///
    /// Streaming responses and inline binary payloads are never cached. Analysis
    /// endpoints additionally require a stable media reference.
    pub fn is_cacheable(&self, request: &CallRequest) -> bool {
        if request.streaming || request.contains_binary {
            return false;
        }
        match request.endpoint {
            Endpoint::Chat | Endpoint::LessonGeneration => true,
            Endpoint::ImageAnalysis | Endpoint::VoiceAnalysis => request.stable_reference,
        }
    }

    pub fn ttl_seconds(&self, endpoint: Endpoint) -> u64 {
        if let Some(&secs) = self.ttl_overrides.get(&endpoint) {
            return secs;
        }
        match endpoint {
            Endpoint::Chat => 3600,
            Endpoint::LessonGeneration => 86_400,
            Endpoint::ImageAnalysis => 7200,
            Endpoint::VoiceAnalysis => 1800,
        }
    }

    pub fn ttl(&self, endpoint: Endpoint) -> Duration {
        Duration::from_secs(self.ttl_seconds(endpoint))
    }

    /// TTL lookup by endpoint name, falling back to [`DEFAULT_TTL_SECS`].
    pub fn ttl_seconds_for_name(&self, name: &str) -> u64 {
        name.parse::<Endpoint>()
            .map(|ep| self.ttl_seconds(ep))
            .unwrap_or(DEFAULT_TTL_SECS)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new()
    }
}
