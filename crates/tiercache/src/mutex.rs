//! Advisory distributed mutex on the remote store.
//!
//! A lock is a key written with set-if-absent and an expiry. It is held until
//! the expiry passes or [`DistributedMutex::unlock`] deletes the key.
//!
//! `unlock` does not check ownership: a holder whose lock already expired and
//! was taken by someone else will release the new holder's lock.

use tiercache_storage::DynRemoteStore;

use crate::error::{CacheError, CacheResult};
use crate::metrics;
use crate::options::LockOptions;
use crate::retry::retry;

/// Value stored under a held lock key.
pub const LOCK_VALUE: &str = "1";

/// Key of the lock guarding `key`.
pub fn lock_key(key: &str) -> String {
    format!("lock:{key}")
}

#[derive(Clone)]
pub struct DistributedMutex {
    remote: DynRemoteStore,
}

impl DistributedMutex {
    pub fn new(remote: DynRemoteStore) -> Self {
        Self { remote }
    }

    /// Acquires `key` for `options.ttl`.
    ///
    /// Makes up to `options.retry.times` attempts. Store errors are retried
    /// within the same budget; when it runs out the last error is returned,
    /// [`CacheError::LockNotAcquired`] if the lock was held.
    pub async fn lock(&self, key: &str, options: LockOptions) -> CacheResult<()> {
        let remote = &self.remote;
        let ttl = options.ttl;

        retry(&options.retry, move || async move {
            if remote.set_if_absent(key, LOCK_VALUE, ttl).await? {
                tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "lock acquired");
                Ok(())
            } else {
                metrics::record_lock_contention();
                Err(CacheError::lock_not_acquired(key))
            }
        })
        .await
    }

    /// Releases `key` regardless of who holds it.
    pub async fn unlock(&self, key: &str) -> CacheResult<()> {
        self.remote.delete(key).await?;
        tracing::debug!(key = %key, "lock released");
        Ok(())
    }
}
