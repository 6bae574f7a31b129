//! Single-process remote store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tiercache_storage::{RemoteStore, SetOp, StoreResult};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    text: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(text: &str, ttl: Option<Duration>) -> Self {
        Self {
            text: text.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// [`RemoteStore`] kept in process memory.
///
/// `set_if_absent` is atomic through the map's entry API; an expired occupant
/// counts as absent.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    data: DashMap<String, StoredValue>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, key: &str) -> Option<String> {
        let now = Instant::now();

        if let Some(stored) = self.data.get(key) {
            if !stored.is_expired(now) {
                return Some(stored.text.clone());
            }
            drop(stored);
            self.data.remove_if(key, |_, stored| stored.is_expired(now));
        }

        None
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|s| !s.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of a key, `None` if absent or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .get(key)
            .filter(|s| !s.is_expired(now))
            .and_then(|s| s.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read(key))
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        Ok(keys.iter().map(|key| self.read(key)).collect())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.data
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();

        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Ok(false);
                }
                occupied.insert(StoredValue::new(value, Some(ttl)));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, Some(ttl)));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn batch_set(&self, ops: &[SetOp]) -> StoreResult<()> {
        for op in ops {
            self.data
                .insert(op.key.clone(), StoredValue::new(&op.value, op.ttl));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_and_expire() {
        let store = InMemoryRemoteStore::new();
        store
            .set("k", "\"v\"", Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("\"v\""));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_without_ttl_persists() {
        let store = InMemoryRemoteStore::new();
        store.set("pool", "[]", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.get("pool").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(store.ttl("pool"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent() {
        let store = InMemoryRemoteStore::new();
        let ttl = Duration::from_secs(1);

        assert!(store.set_if_absent("lock", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "1", ttl).await.unwrap());

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(store.set_if_absent("lock", "1", ttl).await.unwrap());

        store.delete("lock").await.unwrap();
        assert!(store.set_if_absent("lock", "1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_multi_get_is_aligned() {
        let store = InMemoryRemoteStore::new();
        store
            .batch_set(&[
                SetOp::new("a", "1", Some(Duration::from_secs(60))),
                SetOp::new("c", "3", Some(Duration::from_secs(60))),
            ])
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.multi_get(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
        assert!(store.multi_get(&[]).await.unwrap().is_empty());
    }
}
