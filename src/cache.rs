//! 按用户隔离的短期响应缓存（用于搜索结果）。

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    value: Value,
}

/// TTL cache keyed by `(username, key)`. A zero TTL disables caching.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get(&self, username: &str, key: &str) -> Option<Value> {
        if !self.enabled() {
            return None;
        }
        let mut entries = self.entries.lock().await;
        let cache_key = (username.to_string(), key.to_string());
        match entries.get(&cache_key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&cache_key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, username: &str, key: &str, value: Value) {
        if !self.enabled() {
            return;
        }
        let mut entries = self.entries.lock().await;
        entries.insert(
            (username.to_string(), key.to_string()),
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    /// 用户数据变更后丢弃其全部缓存。
    pub async fn invalidate_user(&self, username: &str) {
        let mut entries = self.entries.lock().await;
        entries.retain(|(owner, _), _| owner != username);
        debug!(user = username, "cache invalidated");
    }

    pub async fn prune_expired(&self) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("alice", "q=a", json!([1])).await;
        assert_eq!(cache.get("alice", "q=a").await, Some(json!([1])));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("alice", "q=a").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn entries_are_scoped_per_user() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("alice", "q=a", json!(["mine"])).await;
        assert_eq!(cache.get("bob", "q=a").await, None);

        cache.insert("bob", "q=a", json!(["bob"])).await;
        cache.invalidate_user("alice").await;
        assert_eq!(cache.get("alice", "q=a").await, None);
        assert_eq!(cache.get("bob", "q=a").await, Some(json!(["bob"])));
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("alice", "q=a", json!([1])).await;
        assert_eq!(cache.get("alice", "q=a").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_only_stale_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("alice", "old", json!(1)).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("alice", "new", json!(2)).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.prune_expired().await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("alice", "new").await, Some(json!(2)));
    }
}
