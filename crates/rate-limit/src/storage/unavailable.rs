//! Storage double that reports every operation as a connection failure.

use std::time::Duration;

use super::{CounterStorage, StorageError};

/// Counter storage standing in for an unreachable store.
///
/// Every operation returns [`StorageError::Connection`]; no counter state
/// exists behind it. Used to exercise outage handling without a real
/// backend to take down.
#[derive(Debug, Default)]
pub struct UnavailableStorage;

impl CounterStorage for UnavailableStorage {
    async fn hit(&self, _key: &str, _window: Duration) -> Result<u64, StorageError> {
        Err(StorageError::Connection("storage unavailable".to_string()))
    }

    async fn peek(&self, _key: &str) -> Result<u64, StorageError> {
        Err(StorageError::Connection("storage unavailable".to_string()))
    }

    async fn ttl_remaining(&self, _key: &str) -> Result<Duration, StorageError> {
        Err(StorageError::Connection("storage unavailable".to_string()))
    }
}
