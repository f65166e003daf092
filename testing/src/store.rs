//! In-memory durable store implementing every repository trait.

use chrono::NaiveDate;
use rentflow_core::repository::{
    BookingRepository, NotificationRepository, PaymentRepository, RepositoryError, Result,
    VehicleRepository,
};
use rentflow_core::types::{
    Booking, BookingId, BookingStatus, NewBooking, NewNotification, NewPayment, Notification,
    NotificationId, Payment, PaymentId, PaymentStatus, UserId, Vehicle, VehicleDetails, VehicleId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Tables {
    vehicles: BTreeMap<i64, Vehicle>,
    bookings: BTreeMap<i64, Booking>,
    payments: BTreeMap<i64, Payment>,
    notifications: BTreeMap<i64, Notification>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Default)]
struct Counters {
    find_all: AtomicUsize,
    find_available: AtomicUsize,
}

/// In-memory vehicle, booking, payment and notification tables.
///
/// Ids come from one shared sequence, so they are unique across tables
/// and increase with insertion order. Read counters let tests assert how
/// often the durable store was hit.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct InMemoryRentalStore {
    tables: Arc<Mutex<Tables>>,
    counters: Arc<Counters>,
}

impl InMemoryRentalStore {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `VehicleRepository::find_all` calls.
    #[must_use]
    pub fn find_all_calls(&self) -> usize {
        self.counters.find_all.load(Ordering::SeqCst)
    }

    /// Number of `VehicleRepository::find_available` calls.
    #[must_use]
    pub fn find_available_calls(&self) -> usize {
        self.counters.find_available.load(Ordering::SeqCst)
    }

    /// Number of stored payments.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.tables.lock().unwrap().payments.len()
    }

    /// Insert a booking directly, bypassing any service logic.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn seed_booking(&self, booking: NewBooking) -> Booking {
        let mut tables = self.tables.lock().unwrap();
        let booking = booking.with_id(BookingId::new(tables.next_id()));
        tables.bookings.insert(booking.id.value(), booking.clone());
        booking
    }

    /// Insert a vehicle directly.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn seed_vehicle(&self, details: VehicleDetails) -> Vehicle {
        let mut tables = self.tables.lock().unwrap();
        let vehicle = Vehicle {
            id: VehicleId::new(tables.next_id()),
            details,
        };
        tables.vehicles.insert(vehicle.id.value(), vehicle.clone());
        vehicle
    }
}

impl VehicleRepository for InMemoryRentalStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_id(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        Ok(self.tables.lock().unwrap().vehicles.get(&id.value()).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_all(&self) -> Result<Vec<Vehicle>> {
        self.counters.find_all.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().unwrap().vehicles.values().cloned().collect())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_available(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
    ) -> Result<Vec<Vehicle>> {
        self.counters.find_available.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .vehicles
            .values()
            .filter(|vehicle| vehicle.details.location == location)
            .filter(|vehicle| {
                !tables.bookings.values().any(|booking| {
                    booking.vehicle_id == vehicle.id
                        && booking.status.is_active()
                        && booking.overlaps(start, end)
                })
            })
            .cloned()
            .collect())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn insert(&self, details: VehicleDetails) -> Result<Vehicle> {
        Ok(self.seed_vehicle(details))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn update(&self, vehicle: &Vehicle) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.vehicles.get_mut(&vehicle.id.value()) {
            Some(stored) => {
                *stored = vehicle.clone();
                Ok(())
            }
            None => Err(RepositoryError::Missing {
                entity: "vehicle",
                id: vehicle.id.value(),
            }),
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete_by_id(&self, id: VehicleId) -> Result<()> {
        self.tables.lock().unwrap().vehicles.remove(&id.value());
        Ok(())
    }
}

impl BookingRepository for InMemoryRentalStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.lock().unwrap().bookings.get(&id.value()).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .bookings
            .values()
            .filter(|booking| booking.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, booking: NewBooking) -> Result<Booking> {
        Ok(self.seed_booking(booking))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.bookings.get_mut(&id.value()) {
            Some(stored) if stored.status == expected => {
                stored.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl PaymentRepository for InMemoryRentalStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.lock().unwrap().payments.get(&id.value()).cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .payments
            .values()
            .filter(|payment| payment.booking_id == booking_id)
            .cloned()
            .collect())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let mut tables = self.tables.lock().unwrap();
        let payment = payment.with_id(PaymentId::new(tables.next_id()));
        tables.payments.insert(payment.id.value(), payment.clone());
        Ok(payment)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.payments.get_mut(&id.value()) {
            Some(stored) if stored.status == expected => {
                stored.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl NotificationRepository for InMemoryRentalStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .notifications
            .get(&id.value())
            .cloned())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .tables
            .lock()
            .unwrap()
            .notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn insert(&self, notification: NewNotification) -> Result<Notification> {
        let mut tables = self.tables.lock().unwrap();
        let notification = notification.with_id(NotificationId::new(tables.next_id()));
        tables
            .notifications
            .insert(notification.id.value(), notification.clone());
        Ok(notification)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn update(&self, notification: &Notification) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.notifications.get_mut(&notification.id.value()) {
            Some(stored) => {
                *stored = notification.clone();
                Ok(())
            }
            None => Err(RepositoryError::Missing {
                entity: "notification",
                id: notification.id.value(),
            }),
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete_by_id(&self, id: NotificationId) -> Result<()> {
        self.tables.lock().unwrap().notifications.remove(&id.value());
        Ok(())
    }
}
