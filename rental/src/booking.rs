//! Booking lifecycle.
//!
//! ```text
//! PENDING ──confirm──> CONFIRMED ──cancel──> CANCELLED
//!    └────────────────cancel───────────────────┘
//! ```
//!
//! Creating a booking clears and then takes the vehicle's reservation lock;
//! confirming or cancelling releases it. Lock-store failures never block the
//! flow. Every transition is published after it is stored.

use crate::error::{RentalError, Result};
use crate::publisher::EventPublisher;
use chrono::NaiveDate;
use rentflow_core::environment::Clock;
use rentflow_core::event::BookingEvent;
use rentflow_core::kv_store::KeyValueStore;
use rentflow_core::repository::BookingRepository;
use rentflow_core::types::{
    Booking, BookingId, BookingStatus, Money, NewBooking, UserId, VehicleId, billable_days,
};
use rentflow_runtime::{LockError, ReservationLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Input of [`BookingService::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBooking {
    /// Vehicle to book
    pub vehicle_id: VehicleId,
    /// Booking owner
    pub user_id: UserId,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Price per day quoted for the vehicle
    pub daily_rate: Money,
}

/// Total price of a rental: `daily_rate × max(1, end − start)`.
///
/// # Errors
///
/// Returns [`RentalError::Validation`] when `end < start`, the rate is
/// negative, or the product overflows.
pub fn total_cost(start: NaiveDate, end: NaiveDate, daily_rate: Money) -> Result<Money> {
    if end < start {
        return Err(RentalError::Validation(format!(
            "end date {end} is before start date {start}"
        )));
    }
    if daily_rate < Money::ZERO {
        return Err(RentalError::Validation(format!(
            "daily rate {daily_rate} is negative"
        )));
    }
    daily_rate
        .checked_times(billable_days(start, end))
        .ok_or_else(|| RentalError::Validation("total cost is out of range".to_string()))
}

/// Booking state machine over a durable store, a lock store and the bus.
pub struct BookingService<R, K> {
    bookings: Arc<R>,
    lock: ReservationLock<K>,
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl<R: BookingRepository, K: KeyValueStore> BookingService<R, K> {
    /// Wire the service.
    #[must_use]
    pub fn new(
        bookings: Arc<R>,
        lock: ReservationLock<K>,
        publisher: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            lock,
            publisher,
            clock,
        }
    }

    /// Create a PENDING booking and publish `booking_created`.
    ///
    /// # Errors
    ///
    /// - [`RentalError::Validation`] for an invalid date range or rate,
    ///   before anything is locked or stored
    /// - [`RentalError::Repository`] if the booking cannot be stored
    pub async fn create(&self, request: CreateBooking) -> Result<Booking> {
        let total_cost = total_cost(request.start_date, request.end_date, request.daily_rate)?;

        self.reserve(request.vehicle_id).await;

        let booking = self
            .bookings
            .insert(NewBooking {
                vehicle_id: request.vehicle_id,
                user_id: request.user_id,
                start_date: request.start_date,
                end_date: request.end_date,
                status: BookingStatus::Pending,
                total_cost,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            booking_id = %booking.id,
            vehicle_id = %booking.vehicle_id,
            user_id = %booking.user_id,
            total_cost = %booking.total_cost,
            "Booking created"
        );

        self.publisher
            .publish(&BookingEvent::BookingCreated {
                booking_id: booking.id,
                vehicle_id: booking.vehicle_id,
                user_id: booking.user_id,
            })
            .await;

        Ok(booking)
    }

    /// Confirm a booking, release its vehicle and publish `booking_confirmed`.
    ///
    /// Confirming an already CONFIRMED booking stores nothing new but
    /// releases and publishes again.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] if the booking does not exist
    /// - [`RentalError::InvalidTransition`] if it is CANCELLED
    /// - [`RentalError::Repository`] on store failure
    pub async fn confirm(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = self.transition(booking_id, BookingStatus::Confirmed).await?;
        self.unlock(booking.vehicle_id).await;
        self.publisher
            .publish(&BookingEvent::BookingConfirmed { booking_id })
            .await;
        Ok(booking)
    }

    /// Cancel a booking, release its vehicle and publish `booking_cancelled`.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] if the booking does not exist
    /// - [`RentalError::InvalidTransition`] if it is already CANCELLED
    /// - [`RentalError::Repository`] on store failure
    pub async fn cancel(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = self.transition(booking_id, BookingStatus::Cancelled).await?;
        self.unlock(booking.vehicle_id).await;
        self.publisher
            .publish(&BookingEvent::BookingCancelled { booking_id })
            .await;
        Ok(booking)
    }

    /// Look up a booking.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.find_by_id(booking_id).await?)
    }

    /// A user's bookings, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let mut bookings = self.bookings.find_by_user(user_id).await?;
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    /// Move a booking to `next` with compare-and-set on its current status.
    ///
    /// A lost race re-reads the booking and re-checks the transition, so a
    /// concurrent cancel can never be overwritten by a confirm. Statuses only
    /// move forward, which bounds the retries.
    async fn transition(&self, booking_id: BookingId, next: BookingStatus) -> Result<Booking> {
        loop {
            let mut booking = self
                .bookings
                .find_by_id(booking_id)
                .await?
                .ok_or(RentalError::NotFound {
                    entity: "booking",
                    id: booking_id.value(),
                })?;

            if !booking.status.can_transition_to(next) {
                return Err(RentalError::InvalidTransition {
                    from: booking.status.as_str(),
                    to: next.as_str(),
                });
            }
            if booking.status == next {
                return Ok(booking);
            }

            if self
                .bookings
                .update_status(booking_id, booking.status, next)
                .await?
            {
                info!(
                    booking_id = %booking_id,
                    from = %booking.status,
                    status = %next,
                    "Booking status changed"
                );
                booking.status = next;
                return Ok(booking);
            }
            debug!(booking_id = %booking_id, "Booking changed concurrently, re-reading");
        }
    }

    /// Clear any stale lock, then take it. Never fails the caller.
    async fn reserve(&self, vehicle_id: VehicleId) {
        if let Err(e) = self.lock.release(vehicle_id).await {
            warn!(
                vehicle_id = %vehicle_id,
                error = %e,
                "Lock store unavailable, booking without reservation lock"
            );
            return;
        }
        match self.lock.acquire(vehicle_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(
                    vehicle_id = %vehicle_id,
                    "Reservation lock taken concurrently, booking proceeds"
                );
            }
            Err(e @ LockError::InvalidTtl(_)) => {
                error!(
                    vehicle_id = %vehicle_id,
                    error = %e,
                    "Reservation lock misconfigured, booking without reservation lock"
                );
            }
            Err(e) => {
                warn!(
                    vehicle_id = %vehicle_id,
                    error = %e,
                    "Lock store unavailable, booking without reservation lock"
                );
            }
        }
    }

    async fn unlock(&self, vehicle_id: VehicleId) {
        if let Err(e) = self.lock.release(vehicle_id).await {
            warn!(
                vehicle_id = %vehicle_id,
                error = %e,
                "Failed to release reservation lock, it will expire"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rentflow_core::event::BOOKING_EVENTS;
    use rentflow_testing::{
        InMemoryEventBus, InMemoryKeyValueStore, InMemoryRentalStore, test_clock,
    };
    use std::time::Duration;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        service: BookingService<InMemoryRentalStore, InMemoryKeyValueStore>,
        kv: InMemoryKeyValueStore,
        bus: InMemoryEventBus,
    }

    fn fixture() -> Fixture {
        let kv = InMemoryKeyValueStore::new();
        let bus = InMemoryEventBus::new();
        let service = BookingService::new(
            Arc::new(InMemoryRentalStore::new()),
            ReservationLock::new(Arc::new(kv.clone()), Duration::from_secs(300)),
            EventPublisher::new(Arc::new(bus.clone())),
            Arc::new(test_clock()),
        );
        Fixture { service, kv, bus }
    }

    fn request(vehicle: i64) -> CreateBooking {
        CreateBooking {
            vehicle_id: VehicleId::new(vehicle),
            user_id: UserId::new(1),
            start_date: date("2024-06-01"),
            end_date: date("2024-06-03"),
            daily_rate: Money::from_units(50),
        }
    }

    #[test]
    fn reversed_range_is_rejected() {
        let result = total_cost(date("2024-06-03"), date("2024-06-01"), Money::from_units(50));
        assert!(matches!(result, Err(RentalError::Validation(_))));
    }

    #[tokio::test]
    async fn create_holds_lock_until_confirmed() {
        let f = fixture();
        let booking = f.service.create(request(7)).await.unwrap();
        assert!(f.kv.peek("vehicle:lock:7").is_some());

        f.service.confirm(booking.id).await.unwrap();
        assert!(f.kv.peek("vehicle:lock:7").is_none());
    }

    #[tokio::test]
    async fn create_proceeds_when_lock_store_is_down() {
        let f = fixture();
        f.kv.set_unavailable(true);

        let booking = f.service.create(request(7)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(f.bus.published_json(BOOKING_EVENTS).len(), 1);
    }

    #[tokio::test]
    async fn cancelled_booking_cannot_be_confirmed() {
        let f = fixture();
        let booking = f.service.create(request(7)).await.unwrap();
        f.service.cancel(booking.id).await.unwrap();

        let result = f.service.confirm(booking.id).await;
        assert_eq!(
            result,
            Err(RentalError::InvalidTransition {
                from: "CANCELLED",
                to: "CONFIRMED"
            })
        );
        // created + cancelled only
        assert_eq!(f.bus.published_json(BOOKING_EVENTS).len(), 2);
    }

    #[tokio::test]
    async fn misconfigured_lock_ttl_does_not_block_booking() {
        let kv = InMemoryKeyValueStore::new();
        let service = BookingService::new(
            Arc::new(InMemoryRentalStore::new()),
            ReservationLock::new(Arc::new(kv.clone()), Duration::ZERO),
            EventPublisher::new(Arc::new(InMemoryEventBus::new())),
            Arc::new(test_clock()),
        );

        let booking = service.create(request(7)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(kv.peek("vehicle:lock:7").is_none());
    }

    #[tokio::test]
    async fn publish_failure_keeps_the_booking() {
        let f = fixture();
        f.bus.set_publish_failure(true);

        let booking = f.service.create(request(7)).await.unwrap();
        assert_eq!(f.service.get(booking.id).await.unwrap(), Some(booking));
    }

    /// Store whose reads can lag behind writes: a staged snapshot is
    /// returned by the next `find_by_id`, and every read yields before
    /// returning so concurrent calls interleave.
    #[derive(Default)]
    struct LaggingBookings {
        store: InMemoryRentalStore,
        stale: std::sync::Mutex<Option<Booking>>,
    }

    impl BookingRepository for LaggingBookings {
        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        async fn find_by_id(
            &self,
            id: BookingId,
        ) -> rentflow_core::repository::Result<Option<Booking>> {
            let stale = self.stale.lock().unwrap().take();
            let found = match stale {
                Some(booking) => Some(booking),
                None => self.store.find_by_id(id).await?,
            };
            tokio::task::yield_now().await;
            Ok(found)
        }

        async fn find_by_user(
            &self,
            user_id: UserId,
        ) -> rentflow_core::repository::Result<Vec<Booking>> {
            self.store.find_by_user(user_id).await
        }

        async fn insert(&self, booking: NewBooking) -> rentflow_core::repository::Result<Booking> {
            self.store.insert(booking).await
        }

        async fn update_status(
            &self,
            id: BookingId,
            expected: BookingStatus,
            next: BookingStatus,
        ) -> rentflow_core::repository::Result<bool> {
            self.store.update_status(id, expected, next).await
        }
    }

    fn lagging() -> (
        Arc<LaggingBookings>,
        BookingService<LaggingBookings, InMemoryKeyValueStore>,
        InMemoryEventBus,
    ) {
        let bookings = Arc::new(LaggingBookings::default());
        let bus = InMemoryEventBus::new();
        let service = BookingService::new(
            Arc::clone(&bookings),
            ReservationLock::new(
                Arc::new(InMemoryKeyValueStore::new()),
                Duration::from_secs(300),
            ),
            EventPublisher::new(Arc::new(bus.clone())),
            Arc::new(test_clock()),
        );
        (bookings, service, bus)
    }

    fn event_names(bus: &InMemoryEventBus) -> Vec<String> {
        bus.published_json(BOOKING_EVENTS)
            .into_iter()
            .map(|event| event["event"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn confirm_from_stale_read_does_not_revive_cancelled_booking() {
        let (bookings, service, bus) = lagging();
        let booking = service.create(request(7)).await.unwrap();
        service.cancel(booking.id).await.unwrap();

        *bookings.stale.lock().unwrap() = Some(booking.clone());
        let result = service.confirm(booking.id).await;

        assert_eq!(
            result,
            Err(RentalError::InvalidTransition {
                from: "CANCELLED",
                to: "CONFIRMED"
            })
        );
        let stored = service.get(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(event_names(&bus), ["booking_created", "booking_cancelled"]);
    }

    #[tokio::test]
    async fn interleaved_confirm_and_cancel_end_cancelled() {
        let (_, service, bus) = lagging();
        let booking = service.create(request(7)).await.unwrap();

        let (confirmed, cancelled) =
            tokio::join!(service.confirm(booking.id), service.cancel(booking.id));

        assert_eq!(cancelled.unwrap().status, BookingStatus::Cancelled);
        let stored = service.get(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);

        let names = event_names(&bus);
        assert_eq!(names.last().map(String::as_str), Some("booking_cancelled"));
        match confirmed {
            Ok(_) => assert_eq!(
                names,
                ["booking_created", "booking_confirmed", "booking_cancelled"]
            ),
            Err(e) => {
                assert_eq!(
                    e,
                    RentalError::InvalidTransition {
                        from: "CANCELLED",
                        to: "CONFIRMED"
                    }
                );
                assert_eq!(names, ["booking_created", "booking_cancelled"]);
            }
        }
    }
}
