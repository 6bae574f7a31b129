//! Redis remote tier for tiercache.
//!
//! [`RedisStore`] implements [`RemoteStore`](tiercache_storage::RemoteStore)
//! over a `deadpool-redis` connection pool. Expiries are always sent in
//! milliseconds (`PX`), and batched writes use a non-transactional pipeline
//! because Redis has no multi-key set with per-key expiry.

pub mod config;
pub mod pool;
pub mod store;

pub use config::RedisConfig;
pub use pool::create_pool;
pub use store::RedisStore;
