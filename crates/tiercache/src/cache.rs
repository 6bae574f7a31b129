//! Two-tier cache: a short-lived memory tier in front of a shared remote store.
//!
//! ## Lookup order
//!
//! ```text
//! get → memory tier → remote store → miss
//!            ↑              │
//!            └── warm ──────┘
//! ```
//!
//! Writes go to both tiers. The memory tier always uses its own short TTL
//! window, capped by the remote TTL of the same write, so it stays a shield
//! in front of the remote store, never a long-term copy. Remote TTLs are drawn at random from a window so keys
//! written together do not expire together.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tiercache_core::{Object, TtlRange, Value, decode, encode};
use tiercache_db_memory::{InMemoryRemoteStore, LocalMemoryStore};
use tiercache_storage::{DynMemoryStore, DynRemoteStore, SetOp};
use tokio::task::JoinHandle;

use crate::error::{CacheError, CacheResult};
use crate::keyed_lock::KeyedLocks;
use crate::metrics::{self, tier};
use crate::mutex::DistributedMutex;
use crate::options::{LockOptions, SetOptions};
use crate::refresh::RefreshRegistry;
use crate::semaphore::DistributedSemaphore;

/// Default memory tier window: 2 to 5 seconds.
pub const DEFAULT_MEMORY_TTL: TtlRange = TtlRange {
    min: Duration::from_secs(2),
    max: Duration::from_secs(5),
};

/// Default remote window: 30 to 60 seconds.
pub const DEFAULT_REMOTE_TTL: TtlRange = TtlRange {
    min: Duration::from_secs(30),
    max: Duration::from_secs(60),
};

pub(crate) struct CacheInner {
    pub(crate) memory: DynMemoryStore,
    pub(crate) remote: DynRemoteStore,
    pub(crate) memory_ttl: TtlRange,
    pub(crate) remote_ttl: TtlRange,
    pub(crate) gates: KeyedLocks,
    pub(crate) refreshers: RefreshRegistry,
    pub(crate) mutex: DistributedMutex,
    pub(crate) semaphore: DistributedSemaphore,
    sweeper: Option<JoinHandle<()>>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Handle to a two-tier cache. Clones share the same tiers and tasks.
#[derive(Clone)]
pub struct TierCache {
    pub(crate) inner: Arc<CacheInner>,
}

impl TierCache {
    pub fn builder() -> TierCacheBuilder {
        TierCacheBuilder::default()
    }

    /// Reads `key`, memory tier first.
    ///
    /// `None` means the key is in neither tier; a stored null is
    /// `Some(Value::Null)`. A remote hit warms the memory tier.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        if let Some(value) = self.inner.memory.get(key) {
            tracing::debug!(key = %key, "cache hit (memory)");
            metrics::record_cache_hit(tier::MEMORY);
            return Ok(Some(value));
        }

        match self.inner.remote.get(key).await? {
            Some(text) => {
                let value = decode(&text)?;
                tracing::debug!(key = %key, "cache hit (remote)");
                metrics::record_cache_hit(tier::REMOTE);
                self.warm(key, value.clone(), None);
                Ok(Some(value))
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss();
                Ok(None)
            }
        }
    }

    /// Writes `value` to both tiers.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> CacheResult<()> {
        let value = value.into();
        let text = encode(&value)?;
        let ttl = self.remote_window(&options).sample();

        self.warm(key, value, Some(ttl));
        self.inner.remote.set(key, &text, Some(ttl)).await?;
        Ok(())
    }

    /// Deletes `key` from the remote store, then from memory.
    ///
    /// A failed remote delete leaves the memory tier untouched.
    pub async fn del(&self, key: &str) -> CacheResult<()> {
        self.inner.remote.delete(key).await?;
        self.inner.memory.delete(key);
        Ok(())
    }

    /// Reads several keys with at most one remote round trip.
    ///
    /// The result holds every distinct requested key in first-seen order;
    /// keys found in neither tier map to `None`.
    pub async fn bulk_get<S: AsRef<str>>(
        &self,
        keys: &[S],
    ) -> CacheResult<IndexMap<String, Option<Value>>> {
        let mut values = IndexMap::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            let key = key.as_ref();
            if values.contains_key(key) {
                continue;
            }
            let cached = self.inner.memory.get(key);
            if cached.is_some() {
                metrics::record_cache_hit(tier::MEMORY);
            } else {
                missing.push(key.to_string());
            }
            values.insert(key.to_string(), cached);
        }

        if missing.is_empty() {
            return Ok(values);
        }

        let texts = self.inner.remote.multi_get(&missing).await?;
        for (key, text) in missing.into_iter().zip(texts) {
            let Some(text) = text else {
                metrics::record_cache_miss();
                continue;
            };
            let value = decode(&text)?;
            metrics::record_cache_hit(tier::REMOTE);
            self.warm(&key, value.clone(), None);
            values.insert(key, Some(value));
        }

        Ok(values)
    }

    /// Writes several entries: one memory put each and a single batched
    /// remote write. Each key gets its own sampled remote TTL.
    pub async fn bulk_set<I, K, V>(&self, entries: I, options: SetOptions) -> CacheResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let window = self.remote_window(&options);
        let mut ops = Vec::new();
        let mut values = Vec::new();

        for (key, value) in entries {
            let key = key.into();
            let value = value.into();
            let ttl = window.sample();
            ops.push(SetOp::new(&key, encode(&value)?, Some(ttl)));
            values.push((key, value, ttl));
        }

        if ops.is_empty() {
            return Ok(());
        }

        for (key, value, ttl) in values {
            self.warm(&key, value, Some(ttl));
        }
        self.inner.remote.batch_set(&ops).await?;
        Ok(())
    }

    /// Shallow-merges `fields` into the object stored at `key`.
    pub async fn patch(&self, key: &str, fields: Object, options: SetOptions) -> CacheResult<()> {
        let mut object = match self.get(key).await? {
            None => return Err(CacheError::key_not_found(key)),
            Some(value) if value.is_nullish() => return Err(CacheError::key_not_found(key)),
            Some(Value::Object(object)) => object,
            Some(_) => {
                return Err(CacheError::NotAnObject {
                    key: key.to_string(),
                });
            }
        };

        object.extend(fields);
        self.set(key, Value::Object(object), options).await
    }

    /// Keys currently live in the memory tier.
    pub fn memory_keys(&self) -> Vec<String> {
        self.inner.memory.keys()
    }

    pub fn mutex(&self) -> &DistributedMutex {
        &self.inner.mutex
    }

    pub fn semaphore(&self) -> &DistributedSemaphore {
        &self.inner.semaphore
    }

    /// Stops the background refresher of `key`. Returns `true` if one ran.
    pub fn stop_refresh(&self, key: &str) -> bool {
        self.inner.refreshers.cancel(key)
    }

    /// Whether a background refresher is registered for `key`.
    pub fn is_refreshing(&self, key: &str) -> bool {
        self.inner.refreshers.contains(key)
    }

    /// Stops every background refresher.
    pub fn shutdown(&self) {
        let stopped = self.inner.refreshers.cancel_all();
        tracing::info!(stopped, "cache refreshers stopped");
    }

    pub(crate) fn remote_window(&self, options: &SetOptions) -> TtlRange {
        match options.ttl {
            Some(ttl) => ttl.resolve(self.inner.remote_ttl),
            None => self.inner.remote_ttl,
        }
    }

    /// Puts `value` in the memory tier, never for longer than `remote_ttl`.
    fn warm(&self, key: &str, value: Value, remote_ttl: Option<Duration>) {
        let mut ttl = self.inner.memory_ttl.sample();
        if let Some(remote_ttl) = remote_ttl {
            ttl = ttl.min(remote_ttl);
        }
        self.inner.memory.put(key, value, ttl);
    }
}

impl std::fmt::Debug for TierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierCache")
            .field("remote", &self.inner.remote.backend_name())
            .field("memory_ttl", &self.inner.memory_ttl)
            .field("remote_ttl", &self.inner.remote_ttl)
            .field("refreshers", &self.inner.refreshers.len())
            .finish()
    }
}

/// Wires a [`TierCache`] from explicit parts.
///
/// Unset stores default to a [`LocalMemoryStore`] and an
/// [`InMemoryRemoteStore`].
#[derive(Default)]
pub struct TierCacheBuilder {
    memory: Option<DynMemoryStore>,
    remote: Option<DynRemoteStore>,
    memory_ttl: Option<TtlRange>,
    remote_ttl: Option<TtlRange>,
    semaphore_guard: Option<LockOptions>,
    cleanup_interval: Option<Duration>,
}

impl TierCacheBuilder {
    pub fn memory(mut self, memory: DynMemoryStore) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn remote(mut self, remote: DynRemoteStore) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Window for memory tier entries.
    ///
    /// It must end before [`remote_ttl`](Self::remote_ttl) starts; `build`
    /// clamps it otherwise.
    pub fn memory_ttl(mut self, window: TtlRange) -> Self {
        self.memory_ttl = Some(window);
        self
    }

    /// Window used for remote writes without a caller TTL.
    pub fn remote_ttl(mut self, window: TtlRange) -> Self {
        self.remote_ttl = Some(window);
        self
    }

    /// Lock options of the mutex taken around semaphore operations.
    pub fn semaphore_guard(mut self, guard: LockOptions) -> Self {
        self.semaphore_guard = Some(guard);
        self
    }

    /// Sweeps expired memory entries every `interval`.
    ///
    /// Only applies to the default memory store and needs a tokio runtime.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn build(self) -> TierCache {
        let mut sweeper = None;
        let memory = match self.memory {
            Some(memory) => memory,
            None => {
                let local = Arc::new(LocalMemoryStore::new());
                if let Some(interval) = self.cleanup_interval.filter(|i| !i.is_zero()) {
                    if tokio::runtime::Handle::try_current().is_ok() {
                        sweeper = Some(local.clone().start_cleanup_task(interval));
                    } else {
                        tracing::warn!("no tokio runtime, memory tier sweeper not started");
                    }
                }
                local as DynMemoryStore
            }
        };
        let remote = self
            .remote
            .unwrap_or_else(|| Arc::new(InMemoryRemoteStore::new()) as DynRemoteStore);

        let guard = self.semaphore_guard.unwrap_or_else(|| {
            LockOptions::default().with_retry(100, Duration::from_millis(100))
        });

        let remote_ttl = self.remote_ttl.unwrap_or(DEFAULT_REMOTE_TTL);
        let requested = self.memory_ttl.unwrap_or(DEFAULT_MEMORY_TTL);
        let memory_ttl = memory_window_below(requested, remote_ttl);
        if memory_ttl != requested {
            tracing::warn!(
                requested = ?requested,
                remote = ?remote_ttl,
                clamped = ?memory_ttl,
                "memory TTL window must end before the remote window starts, clamping"
            );
        }

        tracing::debug!(backend = remote.backend_name(), "tier cache built");

        TierCache {
            inner: Arc::new(CacheInner {
                mutex: DistributedMutex::new(remote.clone()),
                semaphore: DistributedSemaphore::new(remote.clone(), guard),
                memory,
                remote,
                memory_ttl,
                remote_ttl,
                gates: KeyedLocks::new(),
                refreshers: RefreshRegistry::new(),
                sweeper,
            }),
        }
    }
}

/// Clamps `memory` so its maximum stays below the remote minimum.
fn memory_window_below(memory: TtlRange, remote: TtlRange) -> TtlRange {
    if memory.max < remote.min {
        return memory;
    }
    let max = remote.min.saturating_sub(Duration::from_millis(1));
    TtlRange::new(memory.min.min(max), max)
}
