//! # tiercache
//!
//! Two-tier cache with distributed coordination primitives.
//!
//! - [`TierCache`]: memory tier in front of a shared remote store, with
//!   `get`/`set`/`del`, bulk variants, read-through `fetch` and
//!   `fetch_and_refresh`, and `patch`.
//! - [`DistributedMutex`]: TTL'd advisory lock on the remote store.
//! - [`DistributedSemaphore`]: pool of lease slots guarded by the mutex.
//!
//! ## Example
//!
//! ```ignore
//! use tiercache::{CacheConfig, SetOptions, create_cache};
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! let user = cache
//!     .fetch("user:1", || async { load_user(1).await }, SetOptions::default())
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keyed_lock;
pub mod metrics;
pub mod mutex;
pub mod observability;
pub mod options;
pub mod refresh;
mod retry;
pub mod semaphore;

use std::sync::Arc;

pub use cache::{DEFAULT_MEMORY_TTL, DEFAULT_REMOTE_TTL, TierCache, TierCacheBuilder};
pub use config::{
    CacheConfig, LoggingConfig, MemoryTierConfig, RemoteTierConfig, SemaphoreConfig,
    load_config, load_config_from_path,
};
pub use error::{BoxError, CacheError, CacheResult, ErrorKind};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use mutex::{DistributedMutex, LOCK_VALUE, lock_key};
pub use options::{LockOptions, RetryPolicy, SemaphoreOptions, SemaphoreSize, SetOptions};
pub use refresh::RefreshRegistry;
pub use semaphore::{DistributedSemaphore, Slot};

pub use tiercache_core::{Object, Ttl, TtlRange, Value, decode, encode};
pub use tiercache_redis::RedisConfig;
pub use tiercache_storage::{DynMemoryStore, DynRemoteStore, MemoryStore, RemoteStore};

/// Builds a cache from configuration.
///
/// With Redis enabled the connection is verified up front. If it fails, the
/// in-process remote store is used when `redis.fallback_to_local` is set;
/// otherwise the error is returned. Locks and semaphores on the in-process
/// store only coordinate within this process.
pub async fn create_cache(config: &CacheConfig) -> CacheResult<TierCache> {
    config.validate().map_err(CacheError::Configuration)?;

    let remote: DynRemoteStore = if config.redis.enabled {
        match tiercache_redis::RedisStore::connect(&config.redis).await {
            Ok(store) => Arc::new(store),
            Err(err) if config.redis.fallback_to_local => {
                tracing::warn!(
                    error = %err,
                    "Failed to connect to Redis, falling back to in-process remote store"
                );
                tiercache_db_memory::create_remote_store()
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        tracing::info!("Redis disabled, using in-process remote store");
        tiercache_db_memory::create_remote_store()
    };

    Ok(TierCache::builder()
        .remote(remote)
        .memory_ttl(config.memory.ttl_range()?)
        .remote_ttl(config.remote.ttl_range()?)
        .semaphore_guard(config.semaphore.guard_options())
        .cleanup_interval(config.memory.cleanup_interval())
        .build())
}
