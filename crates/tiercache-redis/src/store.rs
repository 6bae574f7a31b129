//! `RemoteStore` implementation over a Redis pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use tiercache_storage::{RemoteStore, SetOp, StoreError, StoreResult};

use crate::config::RedisConfig;
use crate::pool::create_pool;

/// Redis-backed remote tier.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and verifies the server answers.
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let store = Self::new(create_pool(config)?);
        store.ping().await?;

        tracing::info!("Connected to Redis");
        Ok(store)
    }

    /// Round-trips a `PING`.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> StoreResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::connection(format!("failed to get Redis connection: {e}")))
    }
}

/// Redis rejects `PX 0`.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

fn command_error(err: redis::RedisError) -> StoreError {
    StoreError::command(err.to_string())
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        tracing::trace!(key = %key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        if values.len() != keys.len() {
            return Err(StoreError::internal(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }

        let _: () = cmd.query_async(&mut conn).await.map_err(command_error)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        match reply.as_deref() {
            Some("OK") => Ok(true),
            None => Ok(false),
            Some(other) => Err(StoreError::command(format!(
                "unexpected SET NX reply: {other}"
            ))),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn batch_set(&self, ops: &[SetOp]) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for op in ops {
            let cmd = pipe.cmd("SET").arg(&op.key).arg(&op.value);
            if let Some(ttl) = op.ttl {
                cmd.arg("PX").arg(ttl_millis(ttl));
            }
            cmd.ignore();
        }

        let mut conn = self.connection().await?;
        let _: () = pipe.query_async(&mut conn).await.map_err(command_error)?;

        tracing::debug!(count = ops.len(), "Redis batch SET");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(500)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(30)), 30_000);
    }
}
