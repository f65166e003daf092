//! Durable record stores.
//!
//! The durable store is the source of truth for vehicles, bookings, payments
//! and notifications. Inserts assign identity; updates overwrite the stored
//! record with the same id. Booking and payment status changes are
//! compare-and-set so that concurrent transitions cannot overwrite each other.

use crate::types::{
    Booking, BookingId, BookingStatus, NewBooking, NewNotification, NewPayment, Notification,
    NotificationId, Payment, PaymentId, PaymentStatus, UserId, Vehicle, VehicleDetails, VehicleId,
};
use chrono::NaiveDate;
use std::future::Future;
use thiserror::Error;

/// Durable store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Query or connection failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored row could not be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Update of a record that does not exist
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Entity kind
        entity: &'static str,
        /// Raw id
        id: i64,
    },
}

/// Convenience alias for repository results.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Vehicle records plus the composite availability query.
pub trait VehicleRepository: Send + Sync {
    /// Look up one vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_id(&self, id: VehicleId) -> impl Future<Output = Result<Option<Vehicle>>> + Send;

    /// Every vehicle, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_all(&self) -> impl Future<Output = Result<Vec<Vehicle>>> + Send;

    /// Vehicles at `location` with no PENDING/CONFIRMED booking overlapping
    /// the inclusive range `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_available(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
    ) -> impl Future<Output = Result<Vec<Vehicle>>> + Send;

    /// Insert a vehicle and assign its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn insert(&self, details: VehicleDetails) -> impl Future<Output = Result<Vehicle>> + Send;

    /// Overwrite an existing vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Missing`] if no vehicle has `vehicle.id`.
    fn update(&self, vehicle: &Vehicle) -> impl Future<Output = Result<()>> + Send;

    /// Delete by id. Deleting a missing vehicle is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn delete_by_id(&self, id: VehicleId) -> impl Future<Output = Result<()>> + Send;
}

/// Booking records.
pub trait BookingRepository: Send + Sync {
    /// Look up one booking.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_id(&self, id: BookingId) -> impl Future<Output = Result<Option<Booking>>> + Send;

    /// A user's bookings in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_user(&self, user_id: UserId) -> impl Future<Output = Result<Vec<Booking>>> + Send;

    /// Insert a booking and assign its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn insert(&self, booking: NewBooking) -> impl Future<Output = Result<Booking>> + Send;

    /// Set the status to `next` only if it is currently `expected`.
    ///
    /// Returns `false` when the booking is missing or its status differs.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Payment records.
pub trait PaymentRepository: Send + Sync {
    /// Look up one payment.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_id(&self, id: PaymentId) -> impl Future<Output = Result<Option<Payment>>> + Send;

    /// Payments for a booking in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_booking(
        &self,
        booking_id: BookingId,
    ) -> impl Future<Output = Result<Vec<Payment>>> + Send;

    /// Insert a payment and assign its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn insert(&self, payment: NewPayment) -> impl Future<Output = Result<Payment>> + Send;

    /// Set the status to `next` only if it is currently `expected`.
    ///
    /// Returns `false` when the payment is missing or its status differs.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Notification records.
pub trait NotificationRepository: Send + Sync {
    /// Look up one notification.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_id(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<Option<Notification>>> + Send;

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn find_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    /// Insert a notification and assign its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn insert(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification>> + Send;

    /// Overwrite an existing notification.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Missing`] if no notification has `notification.id`.
    fn update(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;

    /// Delete by id. Deleting a missing notification is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on query failure.
    fn delete_by_id(&self, id: NotificationId) -> impl Future<Output = Result<()>> + Send;
}
