//! In-process stores for tiercache.
//!
//! - [`LocalMemoryStore`]: the memory tier, a `DashMap` with per-entry expiry.
//! - [`InMemoryRemoteStore`]: a process-local stand-in for the shared remote
//!   store. It gives the same atomicity guarantees as the real store within one
//!   process, which is enough for tests and single-instance deployments.
//!
//! Expiry uses tokio's clock, so a paused test runtime controls it.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tiercache_db_memory::LocalMemoryStore;
//! use tiercache_storage::MemoryStore;
//!
//! let memory = LocalMemoryStore::new();
//! memory.put("greeting", "hello".into(), Duration::from_secs(3));
//! assert!(memory.get("greeting").is_some());
//! ```

pub mod memory;
pub mod remote;

pub use memory::LocalMemoryStore;
pub use remote::InMemoryRemoteStore;

/// Creates a shareable memory tier.
pub fn create_memory_store() -> tiercache_storage::DynMemoryStore {
    std::sync::Arc::new(LocalMemoryStore::new())
}

/// Creates a shareable single-process remote store.
pub fn create_remote_store() -> tiercache_storage::DynRemoteStore {
    std::sync::Arc::new(InMemoryRemoteStore::new())
}
