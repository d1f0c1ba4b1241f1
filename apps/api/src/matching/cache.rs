//! Match result cache keyed by (résumé, job).
//!
//! Writes are last-writer-wins with no coordination: two concurrent requests for the
//! same pair compute the same result and both store it. Backend failures read as a
//! miss and never surface to callers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::matching::scoring::MatchResult;

const MEMORY_CACHE_MAX_ENTRIES: usize = 10_000;

pub fn cache_key(resume_id: Uuid, job_id: &str) -> String {
    format!("match:{resume_id}:{job_id}")
}

#[async_trait]
pub trait MatchCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<MatchResult>;
    async fn put(&self, key: &str, result: &MatchResult);
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisMatchCache {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisMatchCache {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl MatchCache for RedisMatchCache {
    async fn get(&self, key: &str) -> Option<MatchResult> {
        let mut conn = self.conn.clone();
        let raw: redis::RedisResult<Option<String>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;

        match raw {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Discarding undecodable cache entry {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Match cache read failed for {key}: {e}");
                None
            }
        }
    }

    async fn put(&self, key: &str, result: &MatchResult) {
        let json = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize match result for {key}: {e}");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let written: redis::RedisResult<()> = redis::cmd("SET")
            .arg(key)
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await;

        if let Err(e) = written {
            warn!("Match cache write failed for {key}: {e}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process fallback
// ────────────────────────────────────────────────────────────────────────────

/// TTL map used when no Redis is configured.
pub struct MemoryMatchCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, MatchResult)>>,
}

impl MemoryMatchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Instant, MatchResult)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MatchCache for MemoryMatchCache {
    async fn get(&self, key: &str) -> Option<MatchResult> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some((expires_at, result)) if *expires_at > now => return Some(result.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.remove(key);
        None
    }

    async fn put(&self, key: &str, result: &MatchResult) {
        let now = Instant::now();
        let mut entries = self.lock();
        if entries.len() >= MEMORY_CACHE_MAX_ENTRIES {
            entries.retain(|_, (expires_at, _)| *expires_at > now);
            debug!("Match cache pruned to {} entries", entries.len());
        }
        if entries.len() >= MEMORY_CACHE_MAX_ENTRIES {
            return;
        }
        entries.insert(key.to_string(), (now + self.ttl, result.clone()));
    }
}
