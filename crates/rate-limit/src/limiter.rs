//! Admission decision engine.

use std::time::Duration;

use config::{QuotaConfig, RateLimitConfig, StorageConfig};

use crate::error::RateLimitError;
use crate::signature::Signature;
use crate::storage::{CounterStorage, MemoryStorage, RedisStorage, StorageError};

#[cfg(any(test, feature = "test-utils"))]
use crate::storage::UnavailableStorage;

const DEFAULT_MAX_ATTEMPTS: u32 = 60;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Storage backend for rate limiting.
enum Storage {
    Memory(MemoryStorage),
    Redis(RedisStorage),
    #[cfg(any(test, feature = "test-utils"))]
    Unavailable(UnavailableStorage),
}

impl Storage {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        match self {
            Storage::Memory(storage) => storage.hit(key, window).await,
            Storage::Redis(storage) => storage.hit(key, window).await,
            #[cfg(any(test, feature = "test-utils"))]
            Storage::Unavailable(storage) => storage.hit(key, window).await,
        }
    }

    async fn peek(&self, key: &str) -> Result<u64, StorageError> {
        match self {
            Storage::Memory(storage) => storage.peek(key).await,
            Storage::Redis(storage) => storage.peek(key).await,
            #[cfg(any(test, feature = "test-utils"))]
            Storage::Unavailable(storage) => storage.peek(key).await,
        }
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Duration, StorageError> {
        match self {
            Storage::Memory(storage) => storage.ttl_remaining(key).await,
            Storage::Redis(storage) => storage.ttl_remaining(key).await,
            #[cfg(any(test, feature = "test-utils"))]
            Storage::Unavailable(storage) => storage.ttl_remaining(key).await,
        }
    }
}

/// Outcome of one admission evaluation.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request may proceed to the downstream handler.
    pub allowed: bool,
    /// The configured limit, for response headers.
    pub limit: u32,
    /// Remaining quota in the current window, floored at 0.
    pub remaining: u32,
    /// How long the client should wait before retrying, on denial.
    ///
    /// Whole seconds, rounded up so a denied request never sees a zero
    /// delay while its counter still exists. Zero only when the counter
    /// expired between the deny decision and the TTL read, in which case
    /// the next request starts a fresh window anyway.
    pub retry_after: Option<Duration>,
}

/// Decides admit/deny per request signature against a shared counter store.
///
/// The limiter holds no per-request state; every decision reads the store,
/// so any number of concurrent handlers (and processes, with the Redis
/// backend) share one view of each counter.
pub struct RateLimiter {
    max_attempts: u32,
    window: Duration,
    storage: Storage,
}

impl RateLimiter {
    /// Create a rate limiter with the configured storage backend.
    pub async fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let storage = match &config.storage {
            StorageConfig::Memory => Storage::Memory(MemoryStorage::new()),
            StorageConfig::Redis(redis_config) => {
                let redis_storage = RedisStorage::new(redis_config).await.map_err(RateLimitError::Storage)?;
                Storage::Redis(redis_storage)
            }
        };

        Ok(Self::with_storage(config.quota, storage))
    }

    /// Create a rate limiter over in-process counters.
    pub fn in_memory(quota: QuotaConfig) -> Self {
        Self::with_storage(quota, Storage::Memory(MemoryStorage::new()))
    }

    /// Create a rate limiter whose store fails every operation, for
    /// exercising outage handling.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn with_unavailable_storage(quota: QuotaConfig) -> Self {
        Self::with_storage(quota, Storage::Unavailable(UnavailableStorage))
    }

    fn with_storage(quota: QuotaConfig, storage: Storage) -> Self {
        // A zero limit or window would disable the limiter outright; fall
        // back to the defaults instead.
        let max_attempts = if quota.max_attempts == 0 {
            log::warn!("max_attempts of 0 is not a valid quota, using the default of {DEFAULT_MAX_ATTEMPTS}");
            DEFAULT_MAX_ATTEMPTS
        } else {
            quota.max_attempts
        };

        let window = if quota.window.is_zero() {
            log::warn!("a zero-length window is not a valid quota, using the default of {DEFAULT_WINDOW:?}");
            DEFAULT_WINDOW
        } else {
            quota.window
        };

        Self {
            max_attempts,
            window,
            storage,
        }
    }

    /// The effective per-window limit.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The effective window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Evaluate one inbound request, called before the downstream handler.
    ///
    /// Denied requests are not counted: the counter only advances for
    /// admitted requests, so a client hammering a denied endpoint does not
    /// push its own retry point further out. Two requests racing at one
    /// below the limit may both be admitted; the store still serializes
    /// their increments, which is the accepted tolerance of a counter-based
    /// limiter.
    pub async fn check(&self, signature: &Signature) -> Result<Decision, RateLimitError> {
        let key = signature.as_str();
        let count = self.storage.peek(key).await?;

        if count >= u64::from(self.max_attempts) {
            let retry_after = self.storage.ttl_remaining(key).await?;

            log::debug!(
                "Denying {key}: {count} hits with a limit of {} - retry in {retry_after:?}",
                self.max_attempts
            );

            return Ok(Decision {
                allowed: false,
                limit: self.max_attempts,
                remaining: 0,
                retry_after: Some(round_up_to_seconds(retry_after)),
            });
        }

        // Remaining quota comes from the count `hit` returns, not a second
        // peek, so a racing request cannot slip between recording and
        // reading.
        let count = self.storage.hit(key, self.window).await?;
        let remaining = u64::from(self.max_attempts).saturating_sub(count) as u32;

        log::debug!(
            "Admitting {key}: hit {count} of {}, {remaining} remaining",
            self.max_attempts
        );

        Ok(Decision {
            allowed: true,
            limit: self.max_attempts,
            remaining,
            retry_after: None,
        })
    }
}

fn round_up_to_seconds(duration: Duration) -> Duration {
    if duration.subsec_nanos() > 0 {
        Duration::from_secs(duration.as_secs() + 1)
    } else {
        duration
    }
}
