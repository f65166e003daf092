//! Availability: read-through vehicle cache, search and vehicle admin.
//!
//! The full vehicle list is cached as one JSON snapshot under
//! [`VEHICLES_CACHE_KEY`]. A miss rebuilds it from the durable store. Vehicle
//! mutations and consumed booking events overwrite it eagerly.
//!
//! Search bypasses the cache: it runs the durable availability query and
//! then drops vehicles holding a reservation lock. The lock filter is
//! advisory; a lock taken after the query ran is not seen.

use crate::error::{RentalError, Result};
use chrono::NaiveDate;
use rentflow_core::kv_store::KeyValueStore;
use rentflow_core::repository::VehicleRepository;
use rentflow_core::types::{Vehicle, VehicleDetails, VehicleId};
use rentflow_runtime::ReservationLock;
use rentflow_runtime::metrics::CacheMetrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key of the vehicle snapshot.
pub const VEHICLES_CACHE_KEY: &str = "vehicles:all";

/// Read-through cache over the vehicle collection.
pub struct AvailabilityCache<V, K> {
    vehicles: Arc<V>,
    store: Arc<K>,
    lock: ReservationLock<K>,
    ttl: Duration,
}

impl<V: VehicleRepository, K: KeyValueStore> AvailabilityCache<V, K> {
    /// Cache snapshots in `store` for `ttl`; `lock` shares the same store.
    #[must_use]
    pub const fn new(
        vehicles: Arc<V>,
        store: Arc<K>,
        lock: ReservationLock<K>,
        ttl: Duration,
    ) -> Self {
        Self {
            vehicles,
            store,
            lock,
            ttl,
        }
    }

    /// Every vehicle, from the snapshot when present.
    ///
    /// A missing snapshot is rebuilt. A corrupt snapshot or an unreachable
    /// cache falls back to the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] if the durable read fails.
    pub async fn get_all(&self) -> Result<Vec<Vehicle>> {
        match self.store.get(VEHICLES_CACHE_KEY).await {
            Ok(Some(snapshot)) => match serde_json::from_str::<Vec<Vehicle>>(&snapshot) {
                Ok(vehicles) => {
                    CacheMetrics::record_hit();
                    debug!(count = vehicles.len(), "Vehicle cache hit");
                    Ok(vehicles)
                }
                Err(e) => {
                    CacheMetrics::record_decode_failed();
                    warn!(error = %e, "Corrupt vehicle snapshot, rebuilding from store");
                    self.rebuild().await
                }
            },
            Ok(None) => {
                CacheMetrics::record_miss();
                debug!("Vehicle cache miss");
                self.rebuild().await
            }
            Err(e) => {
                warn!(error = %e, "Cache unavailable, reading vehicles from store");
                Ok(self.vehicles.find_all().await?)
            }
        }
    }

    /// Recompute and overwrite the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] if the durable read fails. A cache
    /// write failure is only logged.
    pub async fn refresh(&self) -> Result<()> {
        let vehicles = self.rebuild().await?;
        info!(count = vehicles.len(), "Vehicle cache refreshed");
        Ok(())
    }

    /// Populate the snapshot at startup. Failures are logged; the first
    /// read rebuilds it anyway.
    pub async fn warm(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Vehicle cache warm-up failed");
        }
    }

    /// Vehicles at `location` free over `[start, end]` and not locked.
    ///
    /// # Errors
    ///
    /// - [`RentalError::Validation`] when `end < start`
    /// - [`RentalError::Repository`] if the availability query fails
    pub async fn search(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
    ) -> Result<Vec<Vehicle>> {
        if end < start {
            return Err(RentalError::Validation(format!(
                "end date {end} is before start date {start}"
            )));
        }

        let candidates = self.vehicles.find_available(start, end, location).await?;
        let mut available = Vec::with_capacity(candidates.len());
        for vehicle in candidates {
            match self.lock.is_locked(vehicle.id).await {
                Ok(true) => debug!(vehicle_id = %vehicle.id, "Excluding locked vehicle"),
                Ok(false) => available.push(vehicle),
                Err(e) => {
                    warn!(vehicle_id = %vehicle.id, error = %e, "Lock check failed, treating vehicle as unlocked");
                    available.push(vehicle);
                }
            }
        }
        Ok(available)
    }

    // ------------------------------------------------------------------
    // Vehicle administration
    // ------------------------------------------------------------------

    /// Look up one vehicle in the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn get_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>> {
        Ok(self.vehicles.find_by_id(vehicle_id).await?)
    }

    /// Add a vehicle and refresh the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] if the insert fails.
    pub async fn add_vehicle(&self, details: VehicleDetails) -> Result<Vehicle> {
        let vehicle = self.vehicles.insert(details).await?;
        info!(vehicle_id = %vehicle.id, "Vehicle added");
        self.refresh_after_mutation().await;
        Ok(vehicle)
    }

    /// Replace a vehicle's details and refresh the snapshot.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] if the vehicle does not exist
    /// - [`RentalError::Repository`] on store failure
    pub async fn update_vehicle(
        &self,
        vehicle_id: VehicleId,
        details: VehicleDetails,
    ) -> Result<Vehicle> {
        if self.vehicles.find_by_id(vehicle_id).await?.is_none() {
            return Err(RentalError::NotFound {
                entity: "vehicle",
                id: vehicle_id.value(),
            });
        }

        let vehicle = Vehicle {
            id: vehicle_id,
            details,
        };
        self.vehicles.update(&vehicle).await?;
        info!(vehicle_id = %vehicle_id, "Vehicle updated");
        self.refresh_after_mutation().await;
        Ok(vehicle)
    }

    /// Delete a vehicle and refresh the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] if the delete fails.
    pub async fn delete_vehicle(&self, vehicle_id: VehicleId) -> Result<()> {
        self.vehicles.delete_by_id(vehicle_id).await?;
        info!(vehicle_id = %vehicle_id, "Vehicle deleted");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// One durable read, one cache write.
    async fn rebuild(&self) -> Result<Vec<Vehicle>> {
        let vehicles = self.vehicles.find_all().await?;
        match serde_json::to_string(&vehicles) {
            Ok(snapshot) => {
                if let Err(e) =
                    self.store.set_with_ttl(VEHICLES_CACHE_KEY, &snapshot, self.ttl).await
                {
                    warn!(error = %e, "Failed to store vehicle snapshot");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode vehicle snapshot"),
        }
        Ok(vehicles)
    }

    /// The mutation is stored; a stale snapshot is only a freshness issue.
    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Vehicle cache refresh failed after mutation");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rentflow_core::types::Money;
    use rentflow_testing::{InMemoryKeyValueStore, InMemoryRentalStore};

    fn cache(
        store: &InMemoryRentalStore,
        kv: &InMemoryKeyValueStore,
    ) -> AvailabilityCache<InMemoryRentalStore, InMemoryKeyValueStore> {
        let kv = Arc::new(kv.clone());
        AvailabilityCache::new(
            Arc::new(store.clone()),
            Arc::clone(&kv),
            ReservationLock::new(kv, Duration::from_secs(300)),
            Duration::from_secs(3600),
        )
    }

    fn corolla() -> VehicleDetails {
        VehicleDetails::new("Toyota", "Corolla", 2022, "Berlin", Money::from_units(50), "sedan")
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_store() {
        let store = InMemoryRentalStore::new();
        let kv = InMemoryKeyValueStore::new();
        store.seed_vehicle(corolla());
        kv.insert_raw(VEHICLES_CACHE_KEY, "{not json", Duration::from_secs(60));

        let vehicles = cache(&store, &kv).get_all().await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(store.find_all_calls(), 1);
    }

    #[tokio::test]
    async fn cache_outage_reads_store_directly() {
        let store = InMemoryRentalStore::new();
        let kv = InMemoryKeyValueStore::new();
        store.seed_vehicle(corolla());
        kv.set_unavailable(true);

        assert_eq!(cache(&store, &kv).get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_vehicle_refreshes_snapshot() {
        let store = InMemoryRentalStore::new();
        let kv = InMemoryKeyValueStore::new();
        let cache = cache(&store, &kv);

        let vehicle = cache.add_vehicle(corolla()).await.unwrap();
        let snapshot: Vec<Vehicle> = serde_json::from_str(&kv.peek(VEHICLES_CACHE_KEY).unwrap()).unwrap();
        assert_eq!(snapshot, vec![vehicle]);
    }

    #[tokio::test]
    async fn update_of_unknown_vehicle_is_not_found() {
        let store = InMemoryRentalStore::new();
        let kv = InMemoryKeyValueStore::new();

        let result = cache(&store, &kv).update_vehicle(VehicleId::new(9), corolla()).await;
        assert_eq!(
            result,
            Err(RentalError::NotFound {
                entity: "vehicle",
                id: 9
            })
        );
        assert!(kv.writes().is_empty());
    }

    #[tokio::test]
    async fn reversed_search_range_is_rejected() {
        let store = InMemoryRentalStore::new();
        let kv = InMemoryKeyValueStore::new();
        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let result = cache(&store, &kv).search(start, end, "Berlin").await;
        assert!(matches!(result, Err(RentalError::Validation(_))));
        assert_eq!(store.find_available_calls(), 0);
    }
}
