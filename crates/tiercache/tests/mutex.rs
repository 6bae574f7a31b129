//! Integration tests for the distributed mutex.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tiercache::{DistributedMutex, ErrorKind, LOCK_VALUE, LockOptions, RemoteStore, lock_key};
use tiercache_db_memory::InMemoryRemoteStore;
use tiercache_storage::{SetOp, StoreError, StoreResult};
use tokio_test::{assert_err, assert_ok};

fn mutex() -> (DistributedMutex, Arc<InMemoryRemoteStore>) {
    let remote = Arc::new(InMemoryRemoteStore::new());
    (DistributedMutex::new(remote.clone()), remote)
}

/// Fails the first `failures` lock writes, then behaves.
struct FlakyStore {
    inner: InMemoryRemoteStore,
    failures: usize,
    attempts: AtomicUsize,
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.inner.multi_get(keys).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StoreError::connection("connection reset"));
        }
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn batch_set(&self, ops: &[SetOp]) -> StoreResult<()> {
        self.inner.batch_set(ops).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

#[test]
fn test_lock_key_prefix() {
    assert_eq!(lock_key("user:1"), "lock:user:1");
}

#[tokio::test(start_paused = true)]
async fn test_second_lock_is_refused() {
    let (mutex, remote) = mutex();

    assert_ok!(mutex.lock("job", LockOptions::default()).await);
    assert_eq!(remote.get("job").await.unwrap().as_deref(), Some(LOCK_VALUE));

    let err = assert_err!(mutex.lock("job", LockOptions::default()).await);
    assert!(err.is_lock_not_acquired());
    assert_eq!(err.to_string(), "Lock job could not be acquired");
}

#[tokio::test(start_paused = true)]
async fn test_lock_free_after_ttl() {
    let (mutex, _) = mutex();
    let options = LockOptions::default().with_ttl(Duration::from_millis(500));

    assert_ok!(mutex.lock("job", options).await);
    tokio::time::advance(Duration::from_millis(499)).await;
    assert_err!(mutex.lock("job", options).await);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_ok!(mutex.lock("job", options).await);
}

#[tokio::test(start_paused = true)]
async fn test_unlock_frees_immediately() {
    let (mutex, remote) = mutex();

    assert_ok!(mutex.lock("job", LockOptions::default()).await);
    assert_ok!(mutex.unlock("job").await);
    assert!(remote.is_empty());
    assert_ok!(mutex.lock("job", LockOptions::default()).await);

    // Unlocking a free key is fine
    assert_ok!(mutex.unlock("other").await);
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_for_expiry() {
    let (mutex, _) = mutex();
    let holder = LockOptions::default().with_ttl(Duration::from_millis(250));
    assert_ok!(mutex.lock("job", holder).await);

    let started = tokio::time::Instant::now();
    let waiter = LockOptions::default().with_retry(5, Duration::from_millis(100));
    assert_ok!(mutex.lock("job", waiter).await);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() {
    let (mutex, _) = mutex();
    assert_ok!(mutex.lock("job", LockOptions::default()).await);

    let started = tokio::time::Instant::now();
    let waiter = LockOptions::default().with_retry(3, Duration::from_millis(100));
    let err = assert_err!(mutex.lock("job", waiter).await);
    assert_eq!(err.kind(), ErrorKind::LockNotAcquired);
    // Three attempts, two waits
    assert_eq!(started.elapsed(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_store_errors_are_retried() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryRemoteStore::new(),
        failures: 2,
        attempts: AtomicUsize::new(0),
    });
    let mutex = DistributedMutex::new(store.clone());

    let err = assert_err!(mutex.lock("job", LockOptions::default()).await);
    assert!(err.is_transport());

    let options = LockOptions::default().with_retry(3, Duration::from_millis(10));
    assert_ok!(mutex.lock("job", options).await);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
}
