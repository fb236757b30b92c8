//! Day-bucketed usage persistence.

use super::record::UsageRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Append-only storage of usage records keyed by `(user, day)`.
///
/// Each append refreshes the bucket's retention; a bucket past its retention reads as empty.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn append(
        &self,
        user_id: &str,
        day: NaiveDate,
        record: &UsageRecord,
        retention: Duration,
    ) -> Result<()>;
    async fn read_day(&self, user_id: &str, day: NaiveDate) -> Result<Vec<UsageRecord>>;
    fn name(&self) -> &'static str;
}

struct DayBucket {
    records: Vec<UsageRecord>,
    expires_at: Instant,
}

impl DayBucket {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

type UserBuckets = HashMap<String, HashMap<NaiveDate, DayBucket>>;

/// In-process store. Expired buckets are dropped lazily: a user's buckets on
/// that user's next append or read, everyone's on [`purge_expired`](Self::purge_expired).
#[derive(Default)]
pub struct MemoryUsageStore {
    users: Mutex<UserBuckets>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, UserBuckets>> {
        self.users
            .lock()
            .map_err(|_| Error::store("memory", "usage lock poisoned"))
    }

    /// Number of live day buckets across all users.
    pub fn bucket_count(&self) -> usize {
        self.users
            .lock()
            .map(|users| {
                users
                    .values()
                    .flat_map(|days| days.values())
                    .filter(|d| !d.is_expired())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop every expired bucket; returns how many were removed.
    /// Meant for a periodic sweep when many users stop writing.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut users = self.lock()?;
        let mut removed = 0;
        users.retain(|_, days| {
            removed += purge_user(days);
            !days.is_empty()
        });
        Ok(removed)
    }

    #[cfg(test)]
    fn stored_buckets(&self) -> usize {
        self.users.lock().map(|u| u.values().map(HashMap::len).sum()).unwrap_or(0)
    }
}

fn purge_user(days: &mut HashMap<NaiveDate, DayBucket>) -> usize {
    let before = days.len();
    days.retain(|_, b| !b.is_expired());
    before - days.len()
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn append(
        &self,
        user_id: &str,
        day: NaiveDate,
        record: &UsageRecord,
        retention: Duration,
    ) -> Result<()> {
        let mut users = self.lock()?;
        let days = users.entry(user_id.to_string()).or_default();
        purge_user(days);
        let expires_at = Instant::now() + retention;
        let bucket = days.entry(day).or_insert_with(|| DayBucket {
            records: Vec::new(),
            expires_at,
        });
        bucket.records.push(record.clone());
        bucket.expires_at = expires_at;
        Ok(())
    }

    async fn read_day(&self, user_id: &str, day: NaiveDate) -> Result<Vec<UsageRecord>> {
        let mut users = self.lock()?;
        let Some(days) = users.get_mut(user_id) else {
            return Ok(Vec::new());
        };
        purge_user(days);
        let records = days.get(&day).map(|b| b.records.clone()).unwrap_or_default();
        if days.is_empty() {
            users.remove(user_id);
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
