use super::stats::{GatewayStats, GatewayStatsSnapshot};
use crate::cache::{CacheKey, CacheManager, CachePolicy, CacheStats, KeyDeriver};
use crate::error::AttemptFailure;
use crate::resilience::{call_with_deadline, Join, RetryScheduler, SingleFlight};
use crate::structured::{ExpectedShape, RecoveryQuality, ResponseRecoverer};
use crate::transport::{Upstream, UpstreamReply};
use crate::types::{CallRequest, ClearResult, Endpoint, GatewayResponse, ResponseSource};
use crate::usage::{CostEstimator, UsageLedger, UsageSummary};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the cache holds for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CachedResponse {
    data: Value,
    #[serde(default)]
    quality: Option<RecoveryQuality>,
    /// Cost of the upstream call that produced `data`; reported as savings on every hit.
    estimated_cost: f64,
}

/// Cloneable form of an upstream failure, handed to coalesced followers.
#[derive(Debug, Clone)]
pub(super) enum SharedFailure {
    Timeout {
        attempts: u32,
        deadline_ms: u64,
        last_failure: AttemptFailure,
    },
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl From<&Error> for SharedFailure {
    fn from(e: &Error) -> Self {
        match e {
            Error::UpstreamTimeout {
                attempts,
                deadline_ms,
                last_failure,
            } => SharedFailure::Timeout {
                attempts: *attempts,
                deadline_ms: *deadline_ms,
                last_failure: *last_failure,
            },
            Error::Upstream { status, message } => SharedFailure::Upstream {
                status: *status,
                message: message.clone(),
            },
            other => SharedFailure::Upstream {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<SharedFailure> for Error {
    fn from(f: SharedFailure) -> Self {
        match f {
            SharedFailure::Timeout {
                attempts,
                deadline_ms,
                last_failure,
            } => Error::UpstreamTimeout {
                attempts,
                deadline_ms,
                last_failure,
            },
            SharedFailure::Upstream { status, message } => Error::Upstream { status, message },
        }
    }
}

type FlightOutcome = std::result::Result<CachedResponse, SharedFailure>;

/// Fronts the upstream backend with caching, retries, coalescing, recovery and usage accounting.
///
/// Construct through [`GatewayBuilder`](super::GatewayBuilder).
pub struct Gateway {
    pub(super) upstream: Arc<dyn Upstream>,
    pub(super) policy: ArcSwap<CachePolicy>,
    pub(super) keys: KeyDeriver,
    pub(super) cache: CacheManager,
    pub(super) ledger: UsageLedger,
    pub(super) scheduler: RetryScheduler,
    pub(super) flights: SingleFlight<FlightOutcome>,
    pub(super) single_flight: bool,
    pub(super) direct_timeout: Duration,
    pub(super) recoverer: ResponseRecoverer,
    pub(super) shapes: HashMap<Endpoint, ExpectedShape>,
    pub(super) estimator: CostEstimator,
    pub(super) stats: GatewayStats,
}

impl Gateway {
    pub fn builder() -> super::GatewayBuilder {
        super::GatewayBuilder::new()
    }

    pub async fn invoke(&self, request: CallRequest) -> Result<GatewayResponse> {
        self.invoke_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Service one call: cache lookup, upstream call (coalesced, retried),
    /// recovery, write-through and usage accounting.
    ///
    /// Cancelling `cancel` aborts any in-flight upstream attempt. Cache and
    /// usage store failures are logged and otherwise ignored.
    pub async fn invoke_with_cancel(
        &self,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> Result<GatewayResponse> {
        request.validate()?;
        let started = Instant::now();
        let policy = self.policy.load_full();

        if !policy.is_cacheable(&request) {
            debug!(
                endpoint = %request.endpoint,
                user_id = %request.user_id,
                streaming = request.streaming,
                contains_binary = request.contains_binary,
                "request not cacheable"
            );
            let outcome = self.fetch(&request, &cancel).await;
            return self.finish_upstream(&request, outcome, started).await;
        }

        let key = self.keys.derive(request.endpoint, &request.payload, &request.user_id);
        let ttl = policy.ttl(request.endpoint);

        loop {
            if let Some(hit) = self.lookup(&key).await {
                self.stats.record_cache_hit();
                debug!(endpoint = %request.endpoint, user_id = %request.user_id, cache_key = %key, "cache hit");
                return Ok(self.serve_cached(&request, hit, ResponseSource::Cache).await);
            }
            debug!(endpoint = %request.endpoint, cache_key = %key, "cache miss");

            if !self.single_flight {
                let outcome = self.fetch(&request, &cancel).await;
                if let Ok(resp) = &outcome {
                    self.write_through(&key, resp, ttl).await;
                }
                return self.finish_upstream(&request, outcome, started).await;
            }

            match self.flights.join(key.as_str()) {
                Join::Leader(guard) => {
                    let outcome = self.fetch(&request, &cancel).await;
                    match &outcome {
                        Ok(resp) => {
                            self.write_through(&key, resp, ttl).await;
                            guard.complete(Ok(resp.clone()));
                        }
                        // Followers take over instead of inheriting our cancellation.
                        Err(Error::Cancelled) => drop(guard),
                        Err(e) => guard.complete(Err(SharedFailure::from(e))),
                    }
                    return self.finish_upstream(&request, outcome, started).await;
                }
                Join::Follower(follower) => {
                    debug!(endpoint = %request.endpoint, cache_key = %key, "coalesced onto in-flight request");
                    let shared = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        shared = follower.wait() => shared,
                    };
                    match shared {
                        Some(Ok(resp)) => {
                            self.stats.record_coalesced();
                            return Ok(self
                                .serve_cached(&request, resp, ResponseSource::Coalesced)
                                .await);
                        }
                        Some(Err(failure)) => {
                            self.stats.record_failure();
                            return Err(failure.into());
                        }
                        None => continue,
                    }
                }
            }
        }
    }

    /// Delete every cache entry whose key matches the glob `pattern`
    /// (`*`, `?`, `[...]`, `\` escape). Store errors are returned to the operator.
    pub async fn clear_by_pattern(&self, pattern: &str) -> Result<ClearResult> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::validation_with_context(
                "pattern must not be empty",
                ErrorContext::new()
                    .with_field_path("pattern")
                    .with_source("clear_by_pattern"),
            ));
        }
        let keys_cleared = self.cache.delete_by_pattern(pattern).await?;
        info!(pattern, keys_cleared, "cache entries cleared");
        Ok(ClearResult {
            keys_cleared,
            pattern: pattern.to_string(),
        })
    }

    /// Swap the cache policy; subsequent calls use the new TTLs.
    pub fn reload_policy(&self, policy: CachePolicy) {
        info!(overrides = policy.ttl_overrides.len(), "cache policy reloaded");
        self.policy.store(Arc::new(policy));
    }

    pub fn policy(&self) -> Arc<CachePolicy> {
        self.policy.load_full()
    }

    pub fn cache_key(&self, request: &CallRequest) -> CacheKey {
        self.keys.derive(request.endpoint, &request.payload, &request.user_id)
    }

    pub async fn summarize(&self, user_id: &str, window_days: u32) -> Result<UsageSummary> {
        self.ledger.summarize(user_id, window_days).await
    }

    pub fn stats(&self) -> GatewayStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        match self.cache.get::<CachedResponse>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(cache_key = %key, store = self.cache.store_name(), error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Synthesized placeholders are never stored, so the next identical call
    /// reaches the upstream again instead of replaying the fallback.
    async fn write_through(&self, key: &CacheKey, resp: &CachedResponse, ttl: Duration) {
        if resp.quality == Some(RecoveryQuality::Synthesized) {
            debug!(cache_key = %key, "synthesized content not cached");
            return;
        }
        if let Err(e) = self.cache.set_with_ttl(key, resp, ttl).await {
            warn!(cache_key = %key, store = self.cache.store_name(), error = %e, "cache write failed");
        }
    }

    async fn record_usage(&self, request: &CallRequest, cached: bool, cost: f64) {
        if let Err(e) = self
            .ledger
            .record(&request.user_id, request.endpoint, cached, cost)
            .await
        {
            warn!(
                user_id = %request.user_id,
                endpoint = %request.endpoint,
                store = self.ledger.store_name(),
                error = %e,
                "usage record failed"
            );
        }
    }

    async fn serve_cached(
        &self,
        request: &CallRequest,
        hit: CachedResponse,
        source: ResponseSource,
    ) -> GatewayResponse {
        self.record_usage(request, true, hit.estimated_cost).await;
        GatewayResponse {
            endpoint: request.endpoint,
            data: hit.data,
            source,
            quality: hit.quality,
        }
    }

    async fn finish_upstream(
        &self,
        request: &CallRequest,
        outcome: Result<CachedResponse>,
        started: Instant,
    ) -> Result<GatewayResponse> {
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(resp) => {
                self.record_usage(request, false, resp.estimated_cost).await;
                debug!(endpoint = %request.endpoint, user_id = %request.user_id, duration_ms, "upstream call served");
                Ok(GatewayResponse {
                    endpoint: request.endpoint,
                    data: resp.data,
                    source: ResponseSource::Upstream,
                    quality: resp.quality,
                })
            }
            Err(e) => {
                if !matches!(e, Error::Cancelled) {
                    self.stats.record_failure();
                }
                info!(endpoint = %request.endpoint, user_id = %request.user_id, duration_ms, error = %e, "upstream call failed");
                Err(e)
            }
        }
    }

    /// Upstream call plus recovery. Nothing is written or recorded here.
    async fn fetch(&self, request: &CallRequest, cancel: &CancellationToken) -> Result<CachedResponse> {
        let reply = self.call_upstream(request, cancel).await?;
        let (data, quality) = self.shape_reply(request.endpoint, reply);
        let estimated_cost = self
            .estimator
            .estimate(request.endpoint, &request.payload, &data)
            .total_cost;
        Ok(CachedResponse {
            data,
            quality,
            estimated_cost,
        })
    }

    async fn call_upstream(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<UpstreamReply> {
        let endpoint = request.endpoint;
        let payload = &request.payload;
        let upstream = &self.upstream;
        let stats = &self.stats;

        if endpoint.is_generation() {
            self.scheduler
                .call_with_escalating_timeout(cancel, move |_attempt, _deadline| {
                    stats.record_upstream_call();
                    upstream.call(endpoint, payload)
                })
                .await
        } else {
            stats.record_upstream_call();
            call_with_deadline(cancel, self.direct_timeout, upstream.call(endpoint, payload)).await
        }
    }

    fn shape_reply(&self, endpoint: Endpoint, reply: UpstreamReply) -> (Value, Option<RecoveryQuality>) {
        match self.shapes.get(&endpoint) {
            Some(shape) => {
                let recovered = self.recoverer.recover(&reply.text, shape);
                if recovered.is_degraded() {
                    self.stats.record_degraded();
                }
                (recovered.value, Some(recovered.quality))
            }
            None => {
                let data = reply
                    .body
                    .unwrap_or_else(|| json!({ "response": reply.text }));
                (data, None)
            }
        }
    }
}
