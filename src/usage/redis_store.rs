//! Redis-backed usage store (`redis` feature).

use super::record::UsageRecord;
use super::store::UsageStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PREFIX: &str = "ai_usage";

fn store_err(e: redis::RedisError) -> Error {
    Error::store("redis", e.to_string())
}

/// One Redis list per `(user, day)`: `<prefix>:<user>:<YYYY-MM-DD>`, expired with `EXPIRE`.
#[derive(Clone)]
pub struct RedisUsageStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisUsageStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(store_err)?;
        let conn = ConnectionManager::new(client).await.map_err(store_err)?;
        Ok(Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn bucket_key(&self, user_id: &str, day: NaiveDate) -> String {
        format!("{}:{}:{}", self.prefix, user_id, day.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn append(
        &self,
        user_id: &str,
        day: NaiveDate,
        record: &UsageRecord,
        retention: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.bucket_key(user_id, day);
        let payload = serde_json::to_string(record)?;
        let secs = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX).max(1);
        conn.rpush::<_, _, ()>(&key, payload).await.map_err(store_err)?;
        conn.expire::<_, ()>(&key, secs).await.map_err(store_err)?;
        Ok(())
    }

    async fn read_day(&self, user_id: &str, day: NaiveDate) -> Result<Vec<UsageRecord>> {
        let mut conn = self.conn.clone();
        let key = self.bucket_key(user_id, day);
        let raw: Vec<String> = conn.lrange(&key, 0, -1).await.map_err(store_err)?;
        Ok(raw
            .iter()
            .filter_map(|s| match serde_json::from_str::<UsageRecord>(s) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(bucket = key.as_str(), error = %e, "skipping undecodable usage record");
                    None
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
