//! Shared key-value store used for reservation locks and the availability cache.
//!
//! The store is external and provides its own atomicity: `set_if_absent` is
//! a single check-and-set, `delete_if_equals` a single compare-and-delete.
//! No client-side locking is layered on top.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Key-value store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// Store unreachable or command failed
    #[error("Key-value store unavailable: {0}")]
    Unavailable(String),

    /// TTL cannot be represented by the store
    #[error("Invalid TTL: {0:?}")]
    InvalidTtl(Duration),
}

/// Key-value store with per-key TTL.
///
/// # Implementation Notes
///
/// - Expired keys behave exactly like absent keys
/// - `set_if_absent` MUST be atomic (`SET NX EX` in Redis)
/// - `delete_if_equals` MUST be atomic (a Lua script in Redis)
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, KvError>> + Send;

    /// Write a value that expires after `ttl`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), KvError>> + Send;

    /// Write a value only if the key is absent. Returns whether it was written.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, KvError>> + Send;

    /// Remove a key. Returns whether a live key was removed.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, KvError>> + Send;

    /// Remove a key only if it currently holds `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn delete_if_equals(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool, KvError>> + Send;

    /// Whether a live (unexpired) key exists.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the store cannot be reached.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, KvError>> + Send;
}
