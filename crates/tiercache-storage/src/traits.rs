//! Store traits for the two cache tiers.

use std::time::Duration;

use async_trait::async_trait;
use tiercache_core::Value;

use crate::StoreResult;
use crate::types::SetOp;

/// The shared key-value store behind the memory tier.
///
/// Values are opaque wire text; encoding is the caller's concern. All
/// implementations must be thread-safe (`Send + Sync`) and every call may fail
/// with a [`StoreError`](crate::StoreError).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads a key. Returns `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Reads several keys in one round trip.
    ///
    /// The result is aligned with `keys`; absent keys are `None`. An empty
    /// `keys` slice returns an empty vector without contacting the store.
    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Writes a key, replacing any previous value.
    ///
    /// `ttl` of `None` stores the value without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Atomically writes a key only if it is absent.
    ///
    /// Returns `true` if the value was written, `false` if the key was held.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Deletes a key. Succeeds even if the key was absent.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Executes several writes as a single round trip.
    ///
    /// The batch is not a transaction: other clients may observe a partially
    /// applied batch.
    async fn batch_set(&self, ops: &[SetOp]) -> StoreResult<()>;

    /// Returns the name of this store for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// The process-local tier.
///
/// Entries expire independently. Calls cannot fail.
pub trait MemoryStore: Send + Sync {
    /// Stores `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Reads a live entry. Returns `None` on a miss, `Some(Value::Null)` for a
    /// stored null.
    fn get(&self, key: &str) -> Option<Value>;

    /// Removes an entry.
    fn delete(&self, key: &str);

    /// Keys of all live entries.
    fn keys(&self) -> Vec<String>;

    /// Number of live entries.
    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
