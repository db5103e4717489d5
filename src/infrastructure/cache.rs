//! Short-term in-process cache for snapshots, tickers and the latest
//! environment. Entries expire after their TTL and are purged lazily on
//! access.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, inserted)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (value, Instant::now()));
        // Opportunistic purge keeps the map from accumulating dead keys.
        let ttl = self.ttl;
        entries.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|(_, inserted)| inserted.elapsed() < self.ttl)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_within_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(200));
        cache.put("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(30));
        cache.put("a".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.put("a", 1).await;
        cache.invalidate(&"a").await;
        assert_eq!(cache.get(&"a").await, None);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_millis(80));
        cache.put("a", 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.put("a", 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"a").await, Some(2));
    }
}
