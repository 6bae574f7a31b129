use std::time::Duration;

use deadpool_redis::{Pool, Runtime};
use tiercache_storage::StoreError;

use crate::config::RedisConfig;

/// Builds a connection pool from `config`.
///
/// No connection is opened here; use [`RedisStore::ping`](crate::RedisStore::ping)
/// to verify the server is reachable.
pub fn create_pool(config: &RedisConfig) -> Result<Pool, StoreError> {
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| StoreError::connection(format!("failed to create Redis pool: {e}")))
}
