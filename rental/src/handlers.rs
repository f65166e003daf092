//! Event reactions of the downstream services.
//!
//! Each handler plugs into an [`EventRouter`](rentflow_runtime::EventRouter)
//! under its own consumer group. All of them are safe to run twice on the
//! same event: a refresh is idempotent and a duplicate notification is an
//! accepted side effect of at-least-once delivery.

use crate::availability::AvailabilityCache;
use crate::notification::NotificationService;
use async_trait::async_trait;
use rentflow_core::kv_store::KeyValueStore;
use rentflow_core::repository::{BookingRepository, NotificationRepository, VehicleRepository};
use rentflow_core::types::{BookingId, PaymentId, UserId, VehicleId};
use rentflow_runtime::{HandlerError, RentalEventHandler};
use std::sync::Arc;
use tracing::warn;

/// Refreshes the vehicle snapshot on every booking lifecycle event.
pub struct AvailabilityRefreshHandler<V, K> {
    cache: Arc<AvailabilityCache<V, K>>,
}

impl<V, K> AvailabilityRefreshHandler<V, K> {
    /// Refresh `cache`.
    #[must_use]
    pub const fn new(cache: Arc<AvailabilityCache<V, K>>) -> Self {
        Self { cache }
    }
}

impl<V: VehicleRepository + 'static, K: KeyValueStore + 'static> AvailabilityRefreshHandler<V, K> {
    async fn refresh(&self) -> Result<(), HandlerError> {
        Ok(self.cache.refresh().await?)
    }
}

#[async_trait]
impl<V: VehicleRepository + 'static, K: KeyValueStore + 'static> RentalEventHandler
    for AvailabilityRefreshHandler<V, K>
{
    async fn booking_created(
        &self,
        _booking_id: BookingId,
        _vehicle_id: VehicleId,
        _user_id: UserId,
    ) -> Result<(), HandlerError> {
        self.refresh().await
    }

    async fn booking_confirmed(&self, _booking_id: BookingId) -> Result<(), HandlerError> {
        self.refresh().await
    }

    async fn booking_cancelled(&self, _booking_id: BookingId) -> Result<(), HandlerError> {
        self.refresh().await
    }
}

/// Writes a notification for every booking and payment event.
///
/// Only `booking_created` names its user. Every other event resolves the
/// owner through the booking record; an unknown booking is logged and
/// skipped.
pub struct NotificationHandler<N, B> {
    notifications: Arc<NotificationService<N>>,
    bookings: Arc<B>,
}

impl<N, B> NotificationHandler<N, B> {
    /// Write through `notifications`, resolving owners from `bookings`.
    #[must_use]
    pub const fn new(notifications: Arc<NotificationService<N>>, bookings: Arc<B>) -> Self {
        Self {
            notifications,
            bookings,
        }
    }
}

impl<N, B> NotificationHandler<N, B>
where
    N: NotificationRepository + 'static,
    B: BookingRepository + 'static,
{
    async fn notify(
        &self,
        user_id: UserId,
        kind: &str,
        message: String,
    ) -> Result<(), HandlerError> {
        self.notifications.create(user_id, kind, message).await?;
        Ok(())
    }

    /// Notify the owner of `booking_id`, if the booking exists.
    async fn notify_owner(
        &self,
        booking_id: BookingId,
        kind: &str,
        message: String,
    ) -> Result<(), HandlerError> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        match booking {
            Some(booking) => self.notify(booking.user_id, kind, message).await,
            None => {
                warn!(booking_id = %booking_id, event = kind, "Booking not found, notification skipped");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<N, B> RentalEventHandler for NotificationHandler<N, B>
where
    N: NotificationRepository + 'static,
    B: BookingRepository + 'static,
{
    async fn booking_created(
        &self,
        _booking_id: BookingId,
        vehicle_id: VehicleId,
        user_id: UserId,
    ) -> Result<(), HandlerError> {
        self.notify(
            user_id,
            "booking_created",
            format!("Booking created for vehicle {vehicle_id}"),
        )
        .await
    }

    async fn booking_confirmed(&self, booking_id: BookingId) -> Result<(), HandlerError> {
        self.notify_owner(
            booking_id,
            "booking_confirmed",
            format!("Booking {booking_id} confirmed"),
        )
        .await
    }

    async fn booking_cancelled(&self, booking_id: BookingId) -> Result<(), HandlerError> {
        self.notify_owner(
            booking_id,
            "booking_cancelled",
            format!("Booking {booking_id} cancelled"),
        )
        .await
    }

    async fn payment_completed(
        &self,
        _payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.notify_owner(
            booking_id,
            "payment_completed",
            format!("Payment successful for booking {booking_id}"),
        )
        .await
    }

    async fn payment_failed(
        &self,
        _payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.notify_owner(
            booking_id,
            "payment_failed",
            format!("Payment failed for booking {booking_id}"),
        )
        .await
    }

    async fn payment_refunded(
        &self,
        _payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.notify_owner(
            booking_id,
            "payment_refunded",
            format!("Payment refunded for booking {booking_id}"),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rentflow_core::types::{BookingStatus, Money, NewBooking};
    use rentflow_testing::{InMemoryRentalStore, test_clock};

    fn handler(
        store: &InMemoryRentalStore,
    ) -> NotificationHandler<InMemoryRentalStore, InMemoryRentalStore> {
        let store = Arc::new(store.clone());
        NotificationHandler::new(
            Arc::new(NotificationService::new(Arc::clone(&store), Arc::new(test_clock()))),
            store,
        )
    }

    #[tokio::test]
    async fn payment_notification_goes_to_booking_owner() {
        let store = InMemoryRentalStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let booking = store.seed_booking(NewBooking {
            vehicle_id: VehicleId::new(7),
            user_id: UserId::new(42),
            start_date: date,
            end_date: date,
            status: BookingStatus::Confirmed,
            total_cost: Money::from_units(50),
            created_at: Utc::now(),
        });

        handler(&store)
            .payment_completed(PaymentId::new(9), booking.id)
            .await
            .unwrap();

        let service = NotificationService::new(Arc::new(store.clone()), Arc::new(test_clock()));
        let notifications = service.list_by_user(UserId::new(42)).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "payment_completed");
        assert_eq!(
            notifications[0].message,
            format!("Payment successful for booking {}", booking.id)
        );
        // Never addressed to a user whose id merely equals the booking id
        assert!(service.list_by_user(UserId::new(booking.id.value())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_booking_is_skipped() {
        let store = InMemoryRentalStore::new();
        handler(&store)
            .booking_confirmed(BookingId::new(404))
            .await
            .unwrap();

        let service = NotificationService::new(Arc::new(store), Arc::new(test_clock()));
        assert!(service.list_by_user(UserId::new(404)).await.unwrap().is_empty());
    }
}
