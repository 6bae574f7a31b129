//! Per-key critical sections for a single process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of key to async mutex, created on demand.
///
/// An entry is removed as soon as its last guard is dropped and no task is
/// waiting on it, so the map only holds keys that are in use.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    ///
    /// Dropping the returned future before it completes also reclaims the
    /// entry when nobody else uses it.
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        // Declared before the wait so a cancelled waiter still runs the
        // guard's cleanup, after the pending acquire has let go of its clone.
        let mut keyed = KeyedGuard {
            locks: self,
            key: key.to_string(),
            guard: None,
        };
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        keyed.guard = Some(mutex.lock_owned().await);
        keyed
    }

    /// Number of keys currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a key's critical section until dropped.
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map
        // references the mutex.
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio_test::assert_pending;

    use super::*;

    #[tokio::test]
    async fn test_entry_reclaimed_after_release() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.lock("a").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let _b = locks.lock("b").await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock("shared").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_reclaims_entry() {
        let locks = KeyedLocks::new();
        let holder = locks.lock("a").await;

        let mut waiter = tokio_test::task::spawn(locks.lock("a"));
        assert_pending!(waiter.poll());

        // Holder releases first, then the waiter gives up before acquiring
        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_while_held() {
        let locks = KeyedLocks::new();
        let holder = locks.lock("a").await;

        let mut waiter = tokio_test::task::spawn(locks.lock("a"));
        assert_pending!(waiter.poll());
        drop(waiter);
        assert_eq!(locks.len(), 1);

        drop(holder);
        assert!(locks.is_empty());
    }
}
