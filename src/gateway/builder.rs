use super::config::GatewayConfig;
use super::core::Gateway;
use super::stats::GatewayStats;
use crate::cache::{CacheConfig, CacheManager, CachePolicy, CacheStore, KeyDeriver, MemoryCache};
use crate::resilience::{RetryScheduler, SingleFlight};
use crate::structured::{ExpectedShape, ResponseRecoverer};
use crate::transport::{HttpUpstream, Upstream};
use crate::types::Endpoint;
use crate::usage::{CostEstimator, MemoryUsageStore, UsageLedger, UsageStore};
use crate::Result;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builder for [`Gateway`].
///
/// Every collaborator has a default: an HTTP upstream from the config, an
/// in-memory LRU cache, an in-memory usage store, and the lesson shape for
/// `lesson-generation`.
pub struct GatewayBuilder {
    config: GatewayConfig,
    upstream: Option<Arc<dyn Upstream>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    usage_store: Option<Arc<dyn UsageStore>>,
    policy: Option<CachePolicy>,
    shapes: HashMap<Endpoint, ExpectedShape>,
    estimator: Option<CostEstimator>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        let mut shapes = HashMap::new();
        shapes.insert(Endpoint::LessonGeneration, ExpectedShape::lesson());
        Self {
            config: GatewayConfig::default(),
            upstream: None,
            cache_store: None,
            usage_store: None,
            policy: None,
            shapes,
            estimator: None,
        }
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn upstream(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn usage_store(mut self, store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(store);
        self
    }

    /// Override the policy derived from the config's TTL overrides.
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Recover this endpoint's replies against `shape`.
    pub fn shape(mut self, endpoint: Endpoint, shape: ExpectedShape) -> Self {
        self.shapes.insert(endpoint, shape);
        self
    }

    /// Return this endpoint's replies as delivered, without recovery.
    pub fn without_shape(mut self, endpoint: Endpoint) -> Self {
        self.shapes.remove(&endpoint);
        self
    }

    pub fn estimator(mut self, estimator: CostEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let config = self.config;
        config.validate()?;

        let upstream: Arc<dyn Upstream> = match self.upstream {
            Some(u) => u,
            None => Arc::new(HttpUpstream::new(&config.upstream)?),
        };
        let cache_store: Arc<dyn CacheStore> = self
            .cache_store
            .unwrap_or_else(|| Arc::new(MemoryCache::new(config.cache_max_entries)));
        let usage_store: Arc<dyn UsageStore> = self
            .usage_store
            .unwrap_or_else(|| Arc::new(MemoryUsageStore::new()));
        let policy = self.policy.unwrap_or_else(|| config.policy());

        info!(
            upstream = upstream.name(),
            cache_store = cache_store.name(),
            usage_store = usage_store.name(),
            single_flight = config.single_flight,
            "gateway initialized"
        );

        Ok(Gateway {
            upstream,
            policy: ArcSwap::from_pointee(policy),
            keys: KeyDeriver::with_namespace(config.key_namespace.clone()),
            cache: CacheManager::new(
                CacheConfig::new().with_max_entry_size(config.max_entry_size),
                cache_store,
            ),
            ledger: UsageLedger::new(usage_store).with_retention_days(config.usage_retention_days),
            scheduler: RetryScheduler::new(config.retry.clone()),
            flights: SingleFlight::new(),
            single_flight: config.single_flight,
            direct_timeout: config.direct_timeout(),
            recoverer: ResponseRecoverer::new(),
            shapes: self.shapes,
            estimator: self.estimator.unwrap_or_default(),
            stats: GatewayStats::default(),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
