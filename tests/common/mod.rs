//! Shared fixtures: a scripted in-process upstream and gateway construction helpers.

#![allow(dead_code)]

use ai_gateway::cache::{CacheKey, CacheStore, MemoryCache};
use ai_gateway::gateway::{Gateway, GatewayConfig};
use ai_gateway::resilience::RetryConfig;
use ai_gateway::transport::{Upstream, UpstreamReply};
use ai_gateway::types::Endpoint;
use ai_gateway::usage::{MemoryUsageStore, UsageRecord, UsageStore};
use ai_gateway::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Slow(Duration, String),
    Fail(Option<u16>, String),
}

impl Step {
    pub fn reply(text: impl Into<String>) -> Self {
        Step::Reply(text.into())
    }

    pub fn slow(ms: u64, text: impl Into<String>) -> Self {
        Step::Slow(Duration::from_millis(ms), text.into())
    }
}

/// Plays its steps in order; the last step repeats forever.
pub struct ScriptedUpstream {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Endpoint, Value)>>,
}

impl ScriptedUpstream {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        assert!(!steps.is_empty(), "script needs at least one step");
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: impl Into<String>) -> Arc<Self> {
        Self::new(vec![Step::reply(text)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(Endpoint, Value)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Result<UpstreamReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((endpoint, payload.clone()));
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        };
        match step {
            Step::Reply(text) => Ok(UpstreamReply::text(text)),
            Step::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(UpstreamReply::text(text))
            }
            Step::Fail(status, message) => Err(Error::upstream(status, message)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Cache store that is always unreachable.
pub struct BrokenCache;

#[async_trait]
impl CacheStore for BrokenCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Err(Error::store("broken", "connection refused"))
    }
    async fn set(&self, _key: &CacheKey, _value: &[u8], _ttl: Duration) -> Result<()> {
        Err(Error::store("broken", "connection refused"))
    }
    async fn delete(&self, _key: &CacheKey) -> Result<bool> {
        Err(Error::store("broken", "connection refused"))
    }
    async fn delete_by_pattern(&self, _pattern: &str) -> Result<usize> {
        Err(Error::store("broken", "connection refused"))
    }
    async fn len(&self) -> Result<usize> {
        Err(Error::store("broken", "connection refused"))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Usage store that is always unreachable.
pub struct BrokenUsageStore;

#[async_trait]
impl UsageStore for BrokenUsageStore {
    async fn append(
        &self,
        _user_id: &str,
        _day: NaiveDate,
        _record: &UsageRecord,
        _retention: Duration,
    ) -> Result<()> {
        Err(Error::store("broken", "connection refused"))
    }
    async fn read_day(&self, _user_id: &str, _day: NaiveDate) -> Result<Vec<UsageRecord>> {
        Err(Error::store("broken", "connection refused"))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Millisecond-scale deadlines so retry paths run quickly.
pub fn fast_config() -> GatewayConfig {
    GatewayConfig {
        retry: RetryConfig {
            deadlines_ms: vec![100, 200, 400],
            pause_ms: 1,
            min_viable_len: 50,
        },
        direct_timeout_ms: 300,
        ..Default::default()
    }
}

pub struct Fixture {
    pub gateway: Gateway,
    pub upstream: Arc<ScriptedUpstream>,
    pub cache: Arc<MemoryCache>,
}

impl Fixture {
    pub fn new(upstream: Arc<ScriptedUpstream>) -> Self {
        Self::with_config(upstream, fast_config())
    }

    pub fn with_config(upstream: Arc<ScriptedUpstream>, config: GatewayConfig) -> Self {
        let cache = Arc::new(MemoryCache::new(1_000));
        let gateway = Gateway::builder()
            .config(config)
            .upstream(upstream.clone())
            .cache_store(cache.clone())
            .usage_store(Arc::new(MemoryUsageStore::new()))
            .build()
            .expect("gateway builds");
        Self {
            gateway,
            upstream,
            cache,
        }
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await.unwrap()
    }
}

pub const FRACTIONS_REPLY: &str = r#"Here is the lesson you asked for:

```json
{
  "title": "Fractions",
  "description": "A beginner introduction to fractions",
  "content": "A fraction represents a part of a whole. The top number is the numerator.",
  "objectives": ["Identify numerators and denominators", "Compare simple fractions"],
  "exercises": [{"question": "What is 1/2 of 8?", "answer": "4"}],
}
```

Let me know if you want more exercises!"#;
