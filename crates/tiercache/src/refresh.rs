//! Registry of background refresh tasks, one per key.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;

use crate::metrics;

/// Process-wide map of key to its refresh task.
///
/// Tasks are started lazily by the first registration of a key and run until
/// cancelled. Dropping the registry aborts every task.
#[derive(Debug, Default)]
pub struct RefreshRegistry {
    tasks: DashMap<String, JoinHandle<()>>,
}

impl RefreshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a task for `key` with `spawn` unless a live one exists.
    ///
    /// Returns `true` if a task was started. A finished task is replaced.
    pub fn register_with<F>(&self, key: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let started = match self.tasks.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_finished() {
                    return false;
                }
                occupied.insert(spawn());
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(spawn());
                true
            }
        };

        tracing::debug!(key = %key, "refresh task registered");
        metrics::set_refreshers(self.tasks.len());
        started
    }

    /// Stops the task for `key`. Returns `true` if one was registered.
    pub fn cancel(&self, key: &str) -> bool {
        match self.tasks.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                tracing::debug!(key = %key, "refresh task cancelled");
                metrics::set_refreshers(self.tasks.len());
                true
            }
            None => false,
        }
    }

    /// Stops every task, returning how many were registered.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        keys.iter().filter(|key| self.cancel(key)).count()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for RefreshRegistry {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = RefreshRegistry::new();
        let spawned = AtomicUsize::new(0);

        for _ in 0..3 {
            registry.register_with("k", || {
                spawned.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(pending())
            });
        }

        assert_eq!(spawned.load(Ordering::SeqCst), 1);
        assert!(registry.contains("k"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let registry = RefreshRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        registry.register_with("k", || {
            tokio::spawn(async move {
                let _tx = tx;
                pending::<()>().await;
            })
        });

        assert!(registry.cancel("k"));
        assert!(!registry.cancel("k"));
        // The sender is dropped once the task is aborted
        assert!(rx.await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_finished_task_is_replaced() {
        let registry = RefreshRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = runs.clone();
        registry.register_with("k", || {
            tokio::spawn(async move {
                first.fetch_add(1, Ordering::SeqCst);
            })
        });
        while runs.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        // Let the task reach completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(registry.register_with("k", || tokio::spawn(pending())));
    }

    #[tokio::test]
    async fn test_cancel_all_and_drop() {
        let registry = RefreshRegistry::new();
        registry.register_with("a", || tokio::spawn(pending()));
        registry.register_with("b", || tokio::spawn(pending()));

        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        registry.register_with("c", || {
            tokio::spawn(async move {
                let _tx = tx;
                pending::<()>().await;
            })
        });
        drop(registry);
        assert!(rx.await.is_err());
    }
}
