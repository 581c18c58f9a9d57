//! In-process window counter storage.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::{CounterStorage, StorageError};

/// Counter state for one key's current window.
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory counter storage.
///
/// Observable semantics match [`super::RedisStorage`], including the
/// refresh-on-hit expiry, but counters live in this process only. Suitable
/// for tests and single-instance deployments; time is `tokio::time`, so
/// paused-clock tests can advance windows.
pub struct MemoryStorage {
    entries: DashMap<String, CounterEntry>,
}

impl MemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStorage for MemoryStorage {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        let now = Instant::now();

        // The entry guard holds the shard lock, so concurrent hits for the
        // same key serialize here just as Redis serializes MULTI/EXEC.
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| CounterEntry {
            count: 0,
            expires_at: now + window,
        });

        if entry.expired(now) {
            entry.count = 0;
        }

        entry.count += 1;
        entry.expires_at = now + window;

        Ok(entry.count)
    }

    async fn peek(&self, key: &str) -> Result<u64, StorageError> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(key) else {
            return Ok(0);
        };

        if entry.expired(now) {
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.expired(now));
            return Ok(0);
        }

        Ok(entry.count)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Duration, StorageError> {
        let now = Instant::now();

        let remaining = self
            .entries
            .get(key)
            .map(|entry| entry.expires_at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn first_hit_creates_counter_at_one() {
        let storage = MemoryStorage::new();

        let count = storage.hit("key", WINDOW).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(storage.peek("key").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hits_increment_monotonically() {
        let storage = MemoryStorage::new();

        for expected in 1..=5 {
            assert_eq!(storage.hit("key", WINDOW).await.unwrap(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn peek_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.hit("key", WINDOW).await.unwrap();

        for _ in 0..10 {
            assert_eq!(storage.peek("key").await.unwrap(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn absent_key_peeks_as_zero() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.peek("missing").await.unwrap(), 0);
        assert_eq!(storage.ttl_remaining("missing").await.unwrap(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_resets_after_window_expires() {
        let storage = MemoryStorage::new();

        storage.hit("key", WINDOW).await.unwrap();
        storage.hit("key", WINDOW).await.unwrap();

        tokio::time::advance(WINDOW).await;

        assert_eq!(storage.peek("key").await.unwrap(), 0);
        assert_eq!(storage.hit("key", WINDOW).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hit_refreshes_the_expiry() {
        let storage = MemoryStorage::new();

        storage.hit("key", WINDOW).await.unwrap();
        tokio::time::advance(Duration::from_secs(40)).await;

        // Second hit rearms the full window.
        storage.hit("key", WINDOW).await.unwrap();
        tokio::time::advance(Duration::from_secs(40)).await;

        assert_eq!(storage.peek("key").await.unwrap(), 2);
        assert_eq!(storage.ttl_remaining("key").await.unwrap(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_counts_down() {
        let storage = MemoryStorage::new();

        storage.hit("key", WINDOW).await.unwrap();
        assert_eq!(storage.ttl_remaining("key").await.unwrap(), WINDOW);

        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(storage.ttl_remaining("key").await.unwrap(), Duration::from_secs(35));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_share_counters() {
        let storage = MemoryStorage::new();

        storage.hit("a", WINDOW).await.unwrap();
        storage.hit("a", WINDOW).await.unwrap();
        storage.hit("b", WINDOW).await.unwrap();

        assert_eq!(storage.peek("a").await.unwrap(), 2);
        assert_eq!(storage.peek("b").await.unwrap(), 1);
    }
}
