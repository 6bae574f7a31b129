//! Per-operation options. Every field has a default.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tiercache_core::Ttl;

use crate::error::BoxError;

/// Options for cache writes.
///
/// `ttl` applies to the remote tier only; the memory tier always uses its own
/// short window. `None` samples the remote default window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl: Option<Ttl>,
}

impl SetOptions {
    /// Options with the given remote TTL. A `Duration` gives a fixed expiry.
    pub fn with_ttl(ttl: impl Into<Ttl>) -> Self {
        Self {
            ttl: Some(ttl.into()),
        }
    }
}

/// Lock acquisition retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub interval: Duration,
    /// Total number of attempts. Zero behaves like one.
    pub times: u32,
}

impl RetryPolicy {
    pub fn new(times: u32, interval: Duration) -> Self {
        Self { interval, times }
    }

    /// A single attempt.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.times.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(100))
    }
}

/// Options for mutex locks and semaphore slot acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// How long the lock or slot is held before it expires on its own.
    pub ttl: Duration,
    pub retry: RetryPolicy,
}

impl LockOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, times: u32, interval: Duration) -> Self {
        self.retry = RetryPolicy::new(times, interval);
        self
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

type SizeResolverFn = dyn Fn() -> BoxFuture<'static, Result<usize, BoxError>> + Send + Sync;

/// Size of a semaphore pool on creation.
#[derive(Clone)]
pub enum SemaphoreSize {
    Fixed(usize),
    /// Computed lazily; only runs when the pool does not exist yet.
    Resolver(Arc<SizeResolverFn>),
}

impl fmt::Debug for SemaphoreSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(size) => f.debug_tuple("Fixed").field(size).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Options for [`DistributedSemaphore::retrieve_or_create`](crate::DistributedSemaphore::retrieve_or_create).
#[derive(Debug, Clone)]
pub struct SemaphoreOptions {
    pub size: SemaphoreSize,
}

impl SemaphoreOptions {
    pub fn with_size(size: usize) -> Self {
        Self {
            size: SemaphoreSize::Fixed(size),
        }
    }

    /// Resolves the size with an async callback when the pool is created.
    pub fn with_resolver<F, Fut, E>(resolver: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<usize, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let resolver = move || {
            resolver()
                .map(|res| res.map_err(Into::<BoxError>::into))
                .boxed()
        };
        Self {
            size: SemaphoreSize::Resolver(Arc::new(resolver)),
        }
    }
}

impl Default for SemaphoreOptions {
    fn default() -> Self {
        Self::with_size(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_defaults() {
        let options = LockOptions::default();
        assert_eq!(options.ttl, Duration::from_millis(1000));
        assert_eq!(options.retry.interval, Duration::from_millis(100));
        assert_eq!(options.retry.times, 1);
    }

    #[test]
    fn test_attempts_never_zero() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(RetryPolicy::new(100, Duration::ZERO).attempts(), 100);
    }

    #[test]
    fn test_set_options_from_duration() {
        let options = SetOptions::with_ttl(Duration::from_secs(6));
        assert_eq!(options.ttl, Some(Ttl::fixed(Duration::from_secs(6))));
        assert_eq!(SetOptions::default().ttl, None);
    }

    #[tokio::test]
    async fn test_size_resolver() {
        let options = SemaphoreOptions::with_resolver(|| async { Ok::<_, BoxError>(3) });
        let SemaphoreSize::Resolver(resolve) = options.size else {
            panic!("expected a resolver");
        };
        assert_eq!(resolve().await.unwrap(), 3);
        assert_eq!(
            format!("{:?}", SemaphoreOptions::default().size),
            "Fixed(1)"
        );
    }
}
