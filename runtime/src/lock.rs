//! Per-vehicle reservation lock.
//!
//! A lock is a single key in the shared key-value store,
//! `vehicle:lock:{vehicleId}`, written with set-if-absent and a TTL. The TTL
//! is the only timeout: a crashed holder's lock simply expires.
//!
//! The lock is advisory. Acquisition is one bounded attempt with no retry,
//! and callers treat a store outage as "proceed without the lock". Each
//! acquisition writes a random token, so a caller that kept its
//! [`LockToken`] can release with compare-and-delete
//! ([`ReservationLock::release_owned`]) instead of the unconditional
//! [`ReservationLock::release`].

use crate::metrics::LockMetrics;
use rentflow_core::kv_store::{KeyValueStore, KvError};
use rentflow_core::types::VehicleId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Key prefix for vehicle locks.
pub const LOCK_KEY_PREFIX: &str = "vehicle:lock:";

/// Default lock TTL (5 minutes).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Shortest TTL a lock can be written with; stores expire in whole seconds.
pub const MIN_LOCK_TTL: Duration = Duration::from_secs(1);

/// Lock store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The key-value store could not be reached
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(KvError),

    /// The lock TTL is misconfigured
    #[error("Invalid lock TTL {0:?}: must be at least one second")]
    InvalidTtl(Duration),
}

impl From<KvError> for LockError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::InvalidTtl(ttl) => Self::InvalidTtl(ttl),
            other => Self::StoreUnavailable(other),
        }
    }
}

/// Proof of one acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Token value as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Store key for a vehicle's lock.
#[must_use]
pub fn lock_key(vehicle_id: VehicleId) -> String {
    format!("{LOCK_KEY_PREFIX}{vehicle_id}")
}

/// TTL-bounded mutual-exclusion marker per vehicle.
pub struct ReservationLock<K> {
    store: Arc<K>,
    ttl: Duration,
}

impl<K> Clone for ReservationLock<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
        }
    }
}

impl<K: KeyValueStore> ReservationLock<K> {
    /// Create a lock manager with the given default TTL.
    #[must_use]
    pub const fn new(store: Arc<K>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Default TTL used by [`acquire`](Self::acquire).
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try once to lock `vehicle_id` with the default TTL.
    ///
    /// Returns `Some(token)` if the lock was free, `None` if someone holds it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::StoreUnavailable`] if the store cannot be reached.
    pub async fn acquire(&self, vehicle_id: VehicleId) -> Result<Option<LockToken>, LockError> {
        self.acquire_with_ttl(vehicle_id, self.ttl).await
    }

    /// Try once to lock `vehicle_id` for `ttl`.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidTtl`] if `ttl` is under [`MIN_LOCK_TTL`]; the
    ///   store is not touched
    /// - [`LockError::StoreUnavailable`] if the store cannot be reached
    pub async fn acquire_with_ttl(
        &self,
        vehicle_id: VehicleId,
        ttl: Duration,
    ) -> Result<Option<LockToken>, LockError> {
        if ttl < MIN_LOCK_TTL {
            return Err(LockError::InvalidTtl(ttl));
        }
        let token = LockToken::generate();
        let acquired = self
            .store
            .set_if_absent(&lock_key(vehicle_id), token.as_str(), ttl)
            .await
            .inspect_err(|_| LockMetrics::record_store_unavailable())?;

        if acquired {
            LockMetrics::record_acquired();
            tracing::debug!(vehicle_id = %vehicle_id, ttl_secs = ttl.as_secs(), "Reservation lock acquired");
            Ok(Some(token))
        } else {
            LockMetrics::record_contended();
            tracing::debug!(vehicle_id = %vehicle_id, "Reservation lock already held");
            Ok(None)
        }
    }

    /// Clear the lock whoever holds it. Returns whether a lock was removed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::StoreUnavailable`] if the store cannot be reached.
    pub async fn release(&self, vehicle_id: VehicleId) -> Result<bool, LockError> {
        let removed = self
            .store
            .delete(&lock_key(vehicle_id))
            .await
            .inspect_err(|_| LockMetrics::record_store_unavailable())?;
        tracing::debug!(vehicle_id = %vehicle_id, removed, "Reservation lock released");
        Ok(removed)
    }

    /// Clear the lock only if it still holds `token`.
    ///
    /// Returns `false` when the lock expired or was taken over by another
    /// holder; in that case nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::StoreUnavailable`] if the store cannot be reached.
    pub async fn release_owned(
        &self,
        vehicle_id: VehicleId,
        token: &LockToken,
    ) -> Result<bool, LockError> {
        let removed = self
            .store
            .delete_if_equals(&lock_key(vehicle_id), token.as_str())
            .await
            .inspect_err(|_| LockMetrics::record_store_unavailable())?;
        if !removed {
            tracing::warn!(vehicle_id = %vehicle_id, "Release refused: lock not held by this token");
        }
        Ok(removed)
    }

    /// Whether a live lock exists for `vehicle_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::StoreUnavailable`] if the store cannot be reached.
    pub async fn is_locked(&self, vehicle_id: VehicleId) -> Result<bool, LockError> {
        Ok(self
            .store
            .exists(&lock_key(vehicle_id))
            .await
            .inspect_err(|_| LockMetrics::record_store_unavailable())?)
    }
}
