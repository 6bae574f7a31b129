//! Memory tier backed by `DashMap`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tiercache_core::Value;
use tiercache_storage::MemoryStore;
use tokio::time::Instant;

/// Cached value with its expiry.
#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Process-local memory tier.
///
/// Expired entries are removed lazily on read and in bulk by
/// [`cleanup_expired`](Self::cleanup_expired).
#[derive(Debug, Default)]
pub struct LocalMemoryStore {
    entries: DashMap<String, CachedEntry>,
    evictions: AtomicU64,
}

impl LocalMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }

        removed
    }

    /// Total number of entries dropped after expiring.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Spawns a task that sweeps expired entries every `every`.
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let removed = self.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "memory tier cleanup completed");
                }
            }
        })
    }
}

impl MemoryStore for LocalMemoryStore {
    fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            // Entry expired, remove it
            drop(entry);
            if self
                .entries
                .remove_if(key, |_, entry| entry.is_expired(now))
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        None
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stored_null_is_a_hit() {
        let store = LocalMemoryStore::new();
        store.put("k", Value::Null, Duration::from_secs(2));

        assert_eq!(store.get("k"), Some(Value::Null));
        assert_eq!(store.get("other"), None);
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_independently() {
        let store = LocalMemoryStore::new();
        store.put("short", Value::from(1), Duration::from_secs(2));
        store.put("long", Value::from(2), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(store.get("short"), None);
        assert_eq!(store.get("long"), Some(Value::from(2)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.evictions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let store = LocalMemoryStore::new();
        store.put("a", Value::from("a"), Duration::from_millis(100));
        store.put("b", Value::from("b"), Duration::from_millis(100));
        store.put("c", Value::from("c"), Duration::from_secs(60));

        tokio::time::advance(Duration::from_millis(150)).await;

        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.keys(), vec!["c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps() {
        let store = Arc::new(LocalMemoryStore::new());
        store.put("a", Value::from("a"), Duration::from_millis(100));

        let handle = store.clone().start_cleanup_task(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.evictions(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_delete() {
        let store = LocalMemoryStore::new();
        store.put("k", Value::from(false), Duration::from_secs(2));
        store.delete("k");
        assert!(store.is_empty());
    }
}
