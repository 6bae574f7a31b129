//! Read-through loading on top of [`TierCache`].

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tiercache_core::Value;

use crate::cache::{CacheInner, TierCache};
use crate::error::{BoxError, CacheError, CacheResult};
use crate::metrics;
use crate::mutex::lock_key;
use crate::options::{LockOptions, RetryPolicy, SetOptions};

impl TierCache {
    /// Returns the cached value of `key`, loading and storing it on a miss.
    ///
    /// Concurrent calls for the same key in this process run `loader` once:
    /// after both tiers miss, callers queue on a per-key gate and check both
    /// tiers again before loading. A loader error goes to its caller only;
    /// queued callers then try on their own.
    ///
    /// Other processes are not excluded and may load the same key
    /// concurrently.
    pub async fn fetch<F, Fut, V, E>(
        &self,
        key: &str,
        loader: F,
        options: SetOptions,
    ) -> CacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        V: Into<Value>,
        E: Into<BoxError>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let _gate = self.inner.gates.lock(key).await;

        // Another caller may have loaded the key while we waited
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        metrics::record_loader_call();
        let value: Value = loader().await.map_err(CacheError::loader)?.into();
        self.set(key, value.clone(), options).await?;
        Ok(value)
    }

    /// Batched [`fetch`](Self::fetch).
    ///
    /// `loader` is called once with the keys missing from both tiers, and
    /// only if there are any. What it returns is stored and merged into the
    /// result; keys it leaves out stay `None`.
    ///
    /// There is no per-key gate here, so overlapping concurrent calls can
    /// load the same keys more than once.
    pub async fn bulk_fetch<S, F, Fut, I, K, V, E>(
        &self,
        keys: &[S],
        loader: F,
        options: SetOptions,
    ) -> CacheResult<IndexMap<String, Option<Value>>>
    where
        S: AsRef<str>,
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<I, E>>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        E: Into<BoxError>,
    {
        let mut values = self.bulk_get(keys).await?;

        let missing: Vec<String> = values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key.clone())
            .collect();
        if missing.is_empty() {
            return Ok(values);
        }

        metrics::record_loader_call();
        let loaded: Vec<(String, Value)> = loader(missing)
            .await
            .map_err(CacheError::loader)?
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        self.bulk_set(loaded.iter().cloned(), options).await?;
        for (key, value) in loaded {
            values.insert(key, Some(value));
        }

        Ok(values)
    }

    /// [`fetch`](Self::fetch) that also keeps `key` warm in the background.
    ///
    /// The first call for a key starts a refresher that reloads the value
    /// every half of the minimum remote TTL. Each tick takes the distributed
    /// lock `"lock:" + key` for one period without releasing it, so across
    /// all processes at most one reload happens per period. Tick failures are
    /// logged and the next tick tries again.
    ///
    /// Stop the refresher with [`stop_refresh`](Self::stop_refresh) or
    /// [`shutdown`](Self::shutdown).
    pub async fn fetch_and_refresh<F, Fut, V, E>(
        &self,
        key: &str,
        loader: F,
        options: SetOptions,
    ) -> CacheResult<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Into<Value> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let loader = Arc::new(loader);

        let period = self.refresh_period(&options);
        let weak = Arc::downgrade(&self.inner);
        let refresh_loader = loader.clone();
        self.inner.refreshers.register_with(key, || {
            tokio::spawn(run_refresher(
                weak,
                key.to_string(),
                refresh_loader,
                options,
                period,
            ))
        });

        self.fetch(key, || loader(), options).await
    }

    /// Half of the smallest remote TTL the options can produce.
    pub(crate) fn refresh_period(&self, options: &SetOptions) -> Duration {
        (self.remote_window(options).min / 2).max(Duration::from_millis(1))
    }

    async fn refresh_once<F, Fut, V, E>(
        &self,
        key: &str,
        loader: &F,
        options: SetOptions,
        period: Duration,
    ) -> CacheResult<bool>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        V: Into<Value>,
        E: Into<BoxError>,
    {
        let lock = LockOptions {
            ttl: period,
            retry: RetryPolicy::once(),
        };
        match self.inner.mutex.lock(&lock_key(key), lock).await {
            Ok(()) => {}
            // Another process refreshed this period
            Err(err) if err.is_lock_not_acquired() => return Ok(false),
            Err(err) => return Err(err),
        }

        metrics::record_loader_call();
        let value: Value = loader().await.map_err(CacheError::loader)?.into();
        self.set(key, value, options).await?;
        Ok(true)
    }
}

async fn run_refresher<F, Fut, V, E>(
    cache: Weak<CacheInner>,
    key: String,
    loader: Arc<F>,
    options: SetOptions,
    period: Duration,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    V: Into<Value> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = cache.upgrade() else {
            tracing::debug!(key = %key, "cache dropped, refresher exiting");
            return;
        };
        let cache_handle = TierCache { inner };

        match cache_handle
            .refresh_once(&key, loader.as_ref(), options, period)
            .await
        {
            Ok(true) => tracing::debug!(key = %key, "value refreshed"),
            Ok(false) => tracing::trace!(key = %key, "refresh skipped, lock held elsewhere"),
            Err(err) => tracing::warn!(key = %key, error = %err, "refresh failed"),
        }
    }
}
