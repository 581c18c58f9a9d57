//! Redis-backed window counter storage.

use std::time::Duration;

use deadpool::managed::Object;
use redis::RedisError;

use super::redis_pool::{self, Pool, PoolManager};
use super::{CounterStorage, StorageError};
use config::RedisConfig;

/// Redis-based counter storage.
///
/// The store is the sole owner of counter state and is shared across all
/// concurrent request handlers and across process boundaries. Keys take the
/// form `<prefix><hexdigest>` and are destroyed by Redis expiry, never
/// deleted here.
pub struct RedisStorage {
    /// Redis connection pool.
    pool: Pool,
    /// Key prefix for all rate limit keys.
    key_prefix: String,
    /// Response timeout for Redis commands.
    response_timeout: Option<Duration>,
}

impl RedisStorage {
    /// Create a new Redis storage instance and verify the server is
    /// reachable before any admission decision depends on it.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = redis_pool::create_pool(config)
            .map_err(|e| StorageError::Connection(format!("Failed to create Redis connection pool: {e}")))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to get Redis connection from pool: {e}")))?;

        let ping = redis::cmd("PING");
        let query = ping.query_async::<String>(&mut *conn);

        match config.connection_timeout {
            Some(timeout) => tokio::time::timeout(timeout, query)
                .await
                .map_err(|_| StorageError::Connection("Timed out pinging Redis server".to_string()))?,
            None => query.await,
        }
        .map_err(|e| StorageError::Connection(format!("Failed to ping Redis server: {e}")))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            response_timeout: config.response_timeout,
        })
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<Object<PoolManager>, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run a Redis query under the configured response timeout.
    async fn run<T>(&self, query: impl Future<Output = Result<T, RedisError>>) -> Result<T, StorageError> {
        let result = match self.response_timeout {
            Some(timeout) => tokio::time::timeout(timeout, query)
                .await
                .map_err(|_| StorageError::Connection("Redis command timed out".to_string()))?,
            None => query.await,
        };

        result.map_err(|e| StorageError::Query(e.to_string()))
    }
}

impl CounterStorage for RedisStorage {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        let storage_key = self.storage_key(key);
        let mut conn = self.connection().await?;

        // Sub-second windows would floor to an immediate expiry.
        let window_secs = window.as_secs().max(1) as i64;

        // INCR and EXPIRE execute as one MULTI/EXEC unit, so two concurrent
        // hits for the same key serialize into two increments. The expiry is
        // rearmed on every hit (refresh-on-hit), meaning the window only
        // closes after a full quiet period.
        let mut pipe = redis::pipe();

        pipe.atomic()
            .incr(&storage_key, 1u64)
            .expire(&storage_key, window_secs)
            .ignore();

        let (count,) = self.run(pipe.query_async::<(u64,)>(&mut *conn)).await?;

        Ok(count)
    }

    async fn peek(&self, key: &str) -> Result<u64, StorageError> {
        let storage_key = self.storage_key(key);
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("GET");
        cmd.arg(&storage_key);

        let count = self.run(cmd.query_async::<Option<u64>>(&mut *conn)).await?;

        Ok(count.unwrap_or(0))
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Duration, StorageError> {
        let storage_key = self.storage_key(key);
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("TTL");
        cmd.arg(&storage_key);

        // TTL replies -2 for a missing key and -1 for a key without expiry.
        let ttl = self.run(cmd.query_async::<i64>(&mut *conn)).await?;

        if ttl > 0 {
            Ok(Duration::from_secs(ttl as u64))
        } else {
            Ok(Duration::ZERO)
        }
    }
}
