//! Error types for rate limiting.

use crate::storage::StorageError;

/// Errors that can occur during rate limiting.
///
/// An exceeded limit is not an error: the decision engine reports it through
/// [`crate::Decision`]. Only a failing counter store surfaces here, so
/// callers can choose an explicit fail-open or fail-closed policy instead of
/// the store outage being silently masked as allow or deny.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The backing counter store is unreachable or returned a protocol error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
