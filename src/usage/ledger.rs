//! Per-user, per-day usage ledger.

use super::record::{UsageRecord, UsageSummary};
use super::store::UsageStore;
use crate::types::Endpoint;
use crate::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Appends call records to day buckets and reads them back for rolling-window analytics.
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    retention_days: u32,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days.max(1);
        self
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn record(
        &self,
        user_id: &str,
        endpoint: Endpoint,
        cached: bool,
        estimated_cost: f64,
    ) -> Result<UsageRecord> {
        self.record_at(user_id, endpoint, cached, estimated_cost, Utc::now())
            .await
    }

    /// Append a record into the bucket of the day `at` falls on.
    pub async fn record_at(
        &self,
        user_id: &str,
        endpoint: Endpoint,
        cached: bool,
        estimated_cost: f64,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord> {
        let record = UsageRecord::new(endpoint, cached, estimated_cost, at);
        let retention = Duration::from_secs(u64::from(self.retention_days) * 86_400);
        self.store
            .append(user_id, at.date_naive(), &record, retention)
            .await?;
        Ok(record)
    }

    pub async fn summarize(&self, user_id: &str, window_days: u32) -> Result<UsageSummary> {
        self.summarize_at(user_id, window_days, Utc::now().date_naive())
            .await
    }

    /// Aggregate the last `window_days` buckets ending at `today` (inclusive).
    ///
    /// The window is clamped to `[1, retention_days]`; older buckets are gone by definition.
    pub async fn summarize_at(
        &self,
        user_id: &str,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<UsageSummary> {
        let window = window_days.clamp(1, self.retention_days);
        let mut records = Vec::new();
        for offset in 0..window {
            let Some(day) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            records.extend(self.store.read_day(user_id, day).await?);
        }
        Ok(UsageSummary::from_records(window, &records))
    }
}
