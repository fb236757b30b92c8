//! Redis-backed cache store (`redis` feature).

use super::backend::CacheStore;
use super::key::CacheKey;
use crate::{Error, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

const SCAN_BATCH: usize = 500;

fn store_err(e: redis::RedisError) -> Error {
    Error::store("redis", e.to_string())
}

/// Collect every key matching `pattern` with cursor-based SCAN.
async fn scan_keys(conn: &mut ConnectionManager, pattern: &str) -> Result<Vec<String>> {
    let mut cursor: u64 = 0;
    let mut keys = Vec::new();
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(conn)
            .await
            .map_err(store_err)?;
        keys.extend(batch);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(keys)
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(store_err)?;
        let conn = ConnectionManager::new(client).await.map_err(store_err)?;
        info!(backend = "redis", "cache store connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key.as_str()).await.map_err(store_err)
    }
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // SET EX rejects zero.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key.as_str(), value, secs)
            .await
            .map_err(store_err)
    }
    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(key.as_str()).await.map_err(store_err)?;
        Ok(removed > 0)
    }
    async fn delete_by_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let keys = scan_keys(&mut conn, pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut removed = 0usize;
        for chunk in keys.chunks(SCAN_BATCH) {
            let n: usize = conn.del(chunk.to_vec()).await.map_err(store_err)?;
            removed += n;
        }
        Ok(removed)
    }
    async fn len(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(scan_keys(&mut conn, "*").await?.len())
    }
    fn name(&self) -> &'static str {
        "redis"
    }
}
