//! # tiercache-storage
//!
//! Store abstraction layer for tiercache.
//!
//! This crate defines the two collaborators the cache engine is built on. It
//! does not contain any implementations - those are provided by separate
//! crates (`tiercache-db-memory`, `tiercache-redis`).
//!
//! ## Overview
//!
//! - [`RemoteStore`]: the shared key-value store. Holds wire text, supports
//!   per-key expiry, an atomic set-if-absent, multi-get and batched writes.
//!   Every call is asynchronous and may fail.
//! - [`MemoryStore`]: the process-local tier. Holds decoded values with short
//!   per-key expiry. Calls are synchronous and cannot fail.
//!
//! Both report existence through `Option`: `None` is a miss, `Some(Null)` is a
//! stored null.
//!
//! ## Example
//!
//! ```ignore
//! use tiercache_storage::{RemoteStore, StoreResult};
//!
//! async fn exists(store: &dyn RemoteStore, key: &str) -> StoreResult<bool> {
//!     Ok(store.get(key).await?.is_some())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StoreError};
pub use traits::{MemoryStore, RemoteStore};
pub use types::SetOp;

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared remote store.
pub type DynRemoteStore = std::sync::Arc<dyn RemoteStore>;

/// Type alias for a shared memory store.
pub type DynMemoryStore = std::sync::Arc<dyn MemoryStore>;
