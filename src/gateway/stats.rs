use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStatsSnapshot {
    /// Upstream attempts, retries included.
    pub upstream_calls: u64,
    pub cache_hits: u64,
    /// Requests answered by another request's in-flight upstream call.
    pub coalesced: u64,
    pub degraded_recoveries: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
pub struct GatewayStats {
    upstream_calls: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    degraded_recoveries: AtomicU64,
    failures: AtomicU64,
}

impl GatewayStats {
    pub(crate) fn record_upstream_call(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degraded(&self) {
        self.degraded_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            degraded_recoveries: self.degraded_recoveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
