//! In-process KV store.
//!
//! Single-instance only: state lives in this process, so two coordinator
//! replicas backed by separate `MemoryStore`s will disagree. Use it for
//! development and tests, or a single-node deployment.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use super::{KvStore, StoreError};
use crate::core::clock::{Clock, SystemClock};

struct Bucket {
    fields: BTreeMap<String, Vec<u8>>,
    expires_at_ms: u64,
}

impl Bucket {
    fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Lock-guarded in-memory hash store with lazy TTL expiry.
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of keys currently held (including not-yet-purged expired ones).
    pub async fn key_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    async fn hset(&self, key: &str, field: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let expires_at_ms = now.saturating_add(ttl.as_millis() as u64);
        let mut buckets = self.buckets.write().await;

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            fields: BTreeMap::new(),
            expires_at_ms,
        });
        if !bucket.is_live(now) {
            bucket.fields.clear();
        }
        bucket.fields.insert(field.to_string(), value);
        bucket.expires_at_ms = expires_at_ms;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now_ms();
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(key)
            .filter(|b| b.is_live(now))
            .and_then(|b| b.fields.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let now = self.clock.now_ms();
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(key)
            .filter(|b| b.is_live(now))
            .map(|b| b.fields.clone())
            .unwrap_or_default())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.buckets.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_ms();
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.is_live(now));
        let removed = before - buckets.len();
        if removed > 0 {
            debug!("Purged {} expired keys", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    const TTL: Duration = Duration::from_secs(60);

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (store, _) = store();
        store.hset("k", "a", vec![1, 2], TTL).await.unwrap();
        store.hset("k", "b", vec![3], TTL).await.unwrap();

        assert_eq!(store.hget("k", "a").await.unwrap(), Some(vec![1, 2]));
        assert_eq!(store.hgetall("k").await.unwrap().len(), 2);
        assert_eq!(store.hget("k", "zzz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_and_refresh() {
        let (store, clock) = store();
        store.hset("k", "a", vec![1], TTL).await.unwrap();

        clock.advance_ms(59_000);
        // Refresh with a new field extends the whole key
        store.hset("k", "b", vec![2], TTL).await.unwrap();
        clock.advance_ms(30_000);
        assert_eq!(store.hgetall("k").await.unwrap().len(), 2);

        clock.advance_ms(31_000);
        assert!(store.hgetall("k").await.unwrap().is_empty());
        assert_eq!(store.hget("k", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_after_expiry_starts_fresh() {
        let (store, clock) = store();
        store.hset("k", "old", vec![1], TTL).await.unwrap();
        clock.advance_ms(61_000);
        store.hset("k", "new", vec![2], TTL).await.unwrap();

        let all = store.hgetall("k").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("new"));
    }

    #[tokio::test]
    async fn test_del_and_purge() {
        let (store, clock) = store();
        store.hset("a", "f", vec![1], TTL).await.unwrap();
        store.hset("b", "f", vec![1], Duration::from_secs(600)).await.unwrap();
        store.del("a").await.unwrap();
        assert_eq!(store.key_count().await, 1);

        store.hset("c", "f", vec![1], TTL).await.unwrap();
        clock.advance_ms(120_000);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.key_count().await, 1);
    }
}
