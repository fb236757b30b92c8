//! Usage records and summaries.

use crate::types::Endpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One gateway call, as accounted for analytics.
///
/// For cache hits `estimated_cost` is the cost the cache avoided, not a cost incurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub endpoint: Endpoint,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
    pub estimated_cost: f64,
}

impl UsageRecord {
    pub fn new(endpoint: Endpoint, cached: bool, estimated_cost: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            endpoint,
            timestamp,
            cached,
            estimated_cost,
        }
    }

    /// Cost actually charged for this call: zero when served from cache.
    pub fn charged_cost(&self) -> f64 {
        if self.cached {
            0.0
        } else {
            self.estimated_cost
        }
    }

    /// Cost avoided by the cache for this call.
    pub fn saved_cost(&self) -> f64 {
        if self.cached {
            self.estimated_cost
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUsage {
    pub requests: u64,
    pub cached_requests: u64,
    pub estimated_cost: f64,
    pub estimated_savings: f64,
}

/// Aggregate over a rolling window of day buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub window_days: u32,
    pub total_requests: u64,
    pub cached_requests: u64,
    pub cache_hit_rate: f64,
    pub estimated_cost: f64,
    pub estimated_savings: f64,
    pub by_endpoint: BTreeMap<Endpoint, EndpointUsage>,
}

impl UsageSummary {
    pub(crate) fn from_records<'a>(
        window_days: u32,
        records: impl IntoIterator<Item = &'a UsageRecord>,
    ) -> Self {
        let mut summary = UsageSummary {
            window_days,
            ..Default::default()
        };
        for r in records {
            summary.total_requests += 1;
            summary.estimated_cost += r.charged_cost();
            summary.estimated_savings += r.saved_cost();
            if r.cached {
                summary.cached_requests += 1;
            }

            let per = summary.by_endpoint.entry(r.endpoint).or_default();
            per.requests += 1;
            per.estimated_cost += r.charged_cost();
            per.estimated_savings += r.saved_cost();
            if r.cached {
                per.cached_requests += 1;
            }
        }
        summary.cache_hit_rate = if summary.total_requests == 0 {
            0.0
        } else {
            summary.cached_requests as f64 / summary.total_requests as f64
        };
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_iso_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let r = UsageRecord::new(Endpoint::Chat, false, 0.002, ts);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["endpoint"], "chat");
        assert_eq!(v["cached"], false);
        assert!(v["timestamp"].as_str().unwrap().starts_with("2026-03-01T10:00:00"));
        let back: UsageRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_cached_records_report_savings_not_charges() {
        let r = UsageRecord::new(Endpoint::Chat, true, 0.5, Utc::now());
        assert_eq!(r.charged_cost(), 0.0);
        assert_eq!(r.saved_cost(), 0.5);
    }

    #[test]
    fn test_empty_summary_has_zero_hit_rate() {
        let s = UsageSummary::from_records(7, std::iter::empty());
        assert_eq!(s.total_requests, 0);
        assert_eq!(s.cache_hit_rate, 0.0);
    }
}
