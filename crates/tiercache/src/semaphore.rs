//! Distributed semaphore: a pool of lease slots stored as one remote value.
//!
//! Every operation runs while holding the [`DistributedMutex`] at
//! `"lock:" + key`, so reads and writes of the pool never interleave across
//! processes. The guard is released on every path, errors included.
//!
//! The pool is stored as plain JSON without expiry, e.g.
//! `[{"status":"available"},{"status":"acquired","ttl":1700000000000}]`.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tiercache_core::{CodecError, now_millis};
use tiercache_storage::DynRemoteStore;

use crate::error::{CacheError, CacheResult};
use crate::mutex::{DistributedMutex, lock_key};
use crate::options::{LockOptions, SemaphoreOptions, SemaphoreSize};
use crate::retry::retry;

/// One lease unit of a semaphore pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Slot {
    Available,
    /// Held until `ttl`, in milliseconds since the Unix epoch.
    Acquired { ttl: i64 },
    /// Retired for good.
    Consumed,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        matches!(self, Slot::Available)
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self, Slot::Consumed)
    }

    /// An acquisition whose expiry has passed can be reclaimed.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self, Slot::Acquired { ttl } if *ttl <= now_ms)
    }
}

/// Picks the slot `acquire_lock` takes: the first available one, else the
/// first expired acquisition.
fn claimable_slot(pool: &[Slot], now_ms: i64) -> Option<usize> {
    pool.iter()
        .position(Slot::is_available)
        .or_else(|| pool.iter().position(|slot| slot.is_expired(now_ms)))
}

#[derive(Clone)]
pub struct DistributedSemaphore {
    remote: DynRemoteStore,
    mutex: DistributedMutex,
    guard: LockOptions,
}

impl DistributedSemaphore {
    /// `guard` configures the mutex taken around each operation.
    pub fn new(remote: DynRemoteStore, guard: LockOptions) -> Self {
        Self {
            mutex: DistributedMutex::new(remote.clone()),
            remote,
            guard,
        }
    }

    /// Returns the pool at `key`, creating it if absent.
    ///
    /// The size resolver only runs on creation. Sizes below one become one.
    pub async fn retrieve_or_create(
        &self,
        key: &str,
        options: SemaphoreOptions,
    ) -> CacheResult<Vec<Slot>> {
        self.guarded(key, move || async move {
            if let Some(pool) = self.read_pool(key).await? {
                return Ok(pool);
            }

            let size = match &options.size {
                SemaphoreSize::Fixed(size) => *size,
                SemaphoreSize::Resolver(resolve) => resolve().await.map_err(CacheError::Loader)?,
            };

            let pool = vec![Slot::Available; size.max(1)];
            self.write_pool(key, &pool).await?;
            tracing::debug!(key = %key, size = pool.len(), "semaphore created");
            Ok(pool)
        })
        .await
    }

    /// Acquires a slot for `options.ttl` and returns its index.
    ///
    /// The whole guarded attempt is retried per `options.retry`.
    pub async fn acquire_lock(&self, key: &str, options: LockOptions) -> CacheResult<usize> {
        // Durations past i64 milliseconds hold the slot forever
        let ttl_ms = i64::try_from(options.ttl.as_millis()).unwrap_or(i64::MAX);

        retry(&options.retry, move || {
            self.guarded(key, move || async move {
                let mut pool = self.require_pool(key).await?;
                let now = now_millis();

                let index =
                    claimable_slot(&pool, now).ok_or_else(|| CacheError::no_available_slots(key))?;
                pool[index] = Slot::Acquired {
                    ttl: now.saturating_add(ttl_ms),
                };

                self.write_pool(key, &pool).await?;
                tracing::debug!(key = %key, index, "semaphore slot acquired");
                Ok(index)
            })
        })
        .await
    }

    /// Retires slot `index`.
    ///
    /// If every slot would then be consumed, the slot is made available
    /// instead so that the pool always keeps one usable slot.
    pub async fn consume_lock(&self, key: &str, index: usize) -> CacheResult<()> {
        self.guarded(key, move || async move {
            let mut pool = self.require_pool(key).await?;
            check_index(key, &pool, index)?;

            pool[index] = Slot::Consumed;
            if pool.iter().all(Slot::is_consumed) {
                pool[index] = Slot::Available;
            }

            self.write_pool(key, &pool).await
        })
        .await
    }

    /// Makes slot `index` available, whatever its state.
    pub async fn release_lock(&self, key: &str, index: usize) -> CacheResult<()> {
        self.guarded(key, move || async move {
            let mut pool = self.require_pool(key).await?;
            check_index(key, &pool, index)?;

            pool[index] = Slot::Available;
            self.write_pool(key, &pool).await
        })
        .await
    }

    /// Grows the pool to `size` with available slots. Pools never shrink.
    pub async fn expand(&self, key: &str, size: usize) -> CacheResult<()> {
        self.guarded(key, move || async move {
            let mut pool = self.require_pool(key).await?;

            if pool.len() > size {
                return Err(CacheError::CannotShrink {
                    current: pool.len(),
                    requested: size,
                });
            }
            if pool.len() == size {
                return Ok(());
            }

            pool.resize(size, Slot::Available);
            self.write_pool(key, &pool).await
        })
        .await
    }

    /// Makes every slot available, abandoning current acquisitions.
    pub async fn reset(&self, key: &str) -> CacheResult<Vec<Slot>> {
        self.guarded(key, move || async move {
            let pool = self.require_pool(key).await?;

            let pool = vec![Slot::Available; pool.len()];
            self.write_pool(key, &pool).await?;
            Ok(pool)
        })
        .await
    }

    /// Reads the pool without taking the guard.
    pub async fn inspect(&self, key: &str) -> CacheResult<Option<Vec<Slot>>> {
        self.read_pool(key).await
    }

    async fn guarded<T, F, Fut>(&self, key: &str, op: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let guard_key = lock_key(key);
        self.mutex.lock(&guard_key, self.guard).await?;

        let result = op().await;

        if let Err(err) = self.mutex.unlock(&guard_key).await {
            tracing::warn!(key = %key, error = %err, "failed to release semaphore guard");
        }
        result
    }

    async fn read_pool(&self, key: &str) -> CacheResult<Option<Vec<Slot>>> {
        match self.remote.get(key).await? {
            Some(text) => {
                let pool = serde_json::from_str(&text).map_err(CodecError::from)?;
                Ok(Some(pool))
            }
            None => Ok(None),
        }
    }

    async fn require_pool(&self, key: &str) -> CacheResult<Vec<Slot>> {
        self.read_pool(key)
            .await?
            .ok_or_else(|| CacheError::semaphore_not_found(key))
    }

    async fn write_pool(&self, key: &str, pool: &[Slot]) -> CacheResult<()> {
        let text = serde_json::to_string(pool).map_err(CodecError::from)?;
        self.remote.set(key, &text, None).await?;
        Ok(())
    }
}

fn check_index(key: &str, pool: &[Slot], index: usize) -> CacheResult<()> {
    if index >= pool.len() {
        return Err(CacheError::invalid_index(key, index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_wire_format() {
        let pool = vec![
            Slot::Available,
            Slot::Acquired { ttl: 1_700_000_000_000 },
            Slot::Consumed,
        ];
        assert_eq!(
            serde_json::to_string(&pool).unwrap(),
            r#"[{"status":"available"},{"status":"acquired","ttl":1700000000000},{"status":"consumed"}]"#
        );

        let parsed: Vec<Slot> = serde_json::from_str(
            r#"[{"status":"acquired","ttl":5},{"status":"available"}]"#,
        )
        .unwrap();
        assert_eq!(parsed, vec![Slot::Acquired { ttl: 5 }, Slot::Available]);
    }

    #[test]
    fn test_claimable_prefers_available() {
        let pool = [
            Slot::Acquired { ttl: 10 },
            Slot::Consumed,
            Slot::Available,
        ];
        assert_eq!(claimable_slot(&pool, 100), Some(2));
    }

    #[test]
    fn test_claimable_reclaims_expired() {
        let pool = [
            Slot::Consumed,
            Slot::Acquired { ttl: 200 },
            Slot::Acquired { ttl: 50 },
        ];
        assert_eq!(claimable_slot(&pool, 100), Some(2));
        assert_eq!(claimable_slot(&pool, 50), Some(2));
        assert_eq!(claimable_slot(&pool, 49), None);
    }

    #[test]
    fn test_consumed_slots_never_expire() {
        assert!(!Slot::Consumed.is_expired(i64::MAX));
        assert!(!Slot::Available.is_expired(i64::MAX));
    }

    #[test]
    fn test_check_index() {
        let pool = [Slot::Available, Slot::Available];
        assert!(check_index("s", &pool, 1).is_ok());
        assert_eq!(
            check_index("s", &pool, 2).unwrap_err().to_string(),
            "Index 2 for semaphore s is invalid."
        );
    }
}
