//! Request rate limiting for Floodgate.
//!
//! This crate decides whether an inbound request may proceed based on a
//! per-signature counter held in a shared store:
//!
//! - [`Signature`] derives a stable identity key from the request's method,
//!   host, path and client address.
//! - [`CounterStorage`] backends perform the atomic increment-and-expire
//!   against the store. Redis is the shared backend; an in-memory backend
//!   with the same semantics exists for tests and single-process use.
//! - [`RateLimiter`] turns a signature into an admit/deny [`Decision`]
//!   carrying the remaining quota and retry-after delay.

#![deny(missing_docs)]

mod error;
mod limiter;
mod signature;
mod storage;

pub use error::RateLimitError;
pub use limiter::{Decision, RateLimiter};
pub use signature::Signature;
pub use storage::{CounterStorage, MemoryStorage, RedisStorage, StorageError};

#[cfg(any(test, feature = "test-utils"))]
pub use storage::UnavailableStorage;
