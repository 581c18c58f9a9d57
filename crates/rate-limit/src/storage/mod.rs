//! Storage backends for rate limit counters.

use std::time::Duration;

pub mod memory;
pub mod redis;
mod redis_pool;
#[cfg(any(test, feature = "test-utils"))]
pub mod unavailable;

pub use memory::MemoryStorage;
pub use redis::RedisStorage;
#[cfg(any(test, feature = "test-utils"))]
pub use unavailable::UnavailableStorage;

/// Trait for window counter storage backends.
///
/// The store owns all counter state: an entry is created with count 1 on the
/// first hit of a window, incremented on every further hit, and destroyed by
/// the store's own expiry. Nothing in this crate deletes counters explicitly
/// or caches them in process.
#[allow(async_fn_in_trait)]
pub trait CounterStorage: Send + Sync {
    /// Atomically increment the counter for `key` and arm its expiry.
    ///
    /// The increment and the expiry-set must execute as a single atomic unit
    /// so concurrent hits never lose an increment. The expiry is rearmed on
    /// every hit (refresh-on-hit policy). Returns the post-increment count.
    async fn hit(&self, key: &str, window: Duration) -> Result<u64, StorageError>;

    /// Read the current count for `key` without mutating it.
    ///
    /// An absent or expired key reads as 0.
    async fn peek(&self, key: &str) -> Result<u64, StorageError>;

    /// Remaining time-to-live for `key`.
    ///
    /// Zero when the key is absent or carries no expiry.
    async fn ttl_remaining(&self, key: &str) -> Result<Duration, StorageError>;
}

/// Errors that can occur in storage backends.
///
/// A store failure is never mapped to a zero count; admission decisions made
/// on masked failures would be meaningless.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store cannot be reached.
    #[error("Storage connection error: {0}")]
    Connection(String),
    /// The store replied with an error or an unexpected value.
    #[error("Storage query error: {0}")]
    Query(String),
}
