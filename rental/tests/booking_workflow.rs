//! Booking, payment and availability behaviour through the public services.

#![allow(clippy::unwrap_used)]

mod common;

use common::{date, fixture};
use proptest::prelude::*;
use rentflow_core::event::{BOOKING_EVENTS, PAYMENT_EVENTS};
use rentflow_core::types::{
    BookingId, BookingStatus, Money, PaymentId, UserId, VehicleDetails, VehicleId, billable_days,
};
use rentflow_rental::RentalError;
use rentflow_rental::availability::VEHICLES_CACHE_KEY;
use rentflow_rental::booking::{CreateBooking, total_cost};
use rentflow_runtime::lock::lock_key;
use rentflow_testing::properties::{daily_rate, date_range};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn berlin(make: &str) -> VehicleDetails {
    VehicleDetails::new(make, "Model", 2022, "Berlin", Money::from_units(50), "sedan")
}

proptest! {
    #[test]
    fn total_cost_is_rate_times_billable_days((start, end) in date_range(), rate in daily_rate()) {
        let cost = total_cost(start, end, rate).unwrap();
        let days = (end - start).num_days().max(1);
        prop_assert_eq!(cost.amount(), rate.amount() * Decimal::from(days));
        prop_assert_eq!(days, billable_days(start, end));
    }
}

#[tokio::test]
async fn create_booking_prices_and_publishes() {
    let f = fixture();

    let booking = f
        .services
        .bookings
        .create(CreateBooking {
            vehicle_id: VehicleId::new(7),
            user_id: UserId::new(1),
            start_date: date("2024-06-01"),
            end_date: date("2024-06-03"),
            daily_rate: Money::from_units(50),
        })
        .await
        .unwrap();

    assert_eq!(booking.total_cost, Money::from_units(100));
    assert_eq!(booking.status, BookingStatus::Pending);

    let events = f.bus.published_json(BOOKING_EVENTS);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "booking_created");
    assert_eq!(events[0]["bookingId"], booking.id.value());
    assert_eq!(events[0]["vehicleId"], 7);
    assert_eq!(events[0]["userId"], 1);
}

#[tokio::test]
async fn same_day_booking_costs_one_day() {
    let f = fixture();
    let booking = f
        .services
        .bookings
        .create(CreateBooking {
            vehicle_id: VehicleId::new(7),
            user_id: UserId::new(1),
            start_date: date("2024-06-01"),
            end_date: date("2024-06-01"),
            daily_rate: Money::from_units(50),
        })
        .await
        .unwrap();

    assert_eq!(booking.total_cost, Money::from_units(50));
}

#[tokio::test]
async fn invalid_range_creates_nothing() {
    let f = fixture();
    let result = f
        .services
        .bookings
        .create(CreateBooking {
            vehicle_id: VehicleId::new(7),
            user_id: UserId::new(1),
            start_date: date("2024-06-03"),
            end_date: date("2024-06-01"),
            daily_rate: Money::from_units(50),
        })
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, RentalError::Validation(_)));
    assert!(f.kv.peek(&lock_key(VehicleId::new(7))).is_none());
    assert!(f.bus.published().is_empty());
}

#[tokio::test]
async fn confirm_and_cancel_of_unknown_booking_publish_nothing() {
    let f = fixture();
    let missing = BookingId::new(999);

    assert_eq!(
        f.services.bookings.confirm(missing).await,
        Err(RentalError::NotFound {
            entity: "booking",
            id: 999
        })
    );
    assert_eq!(
        f.services.bookings.cancel(missing).await,
        Err(RentalError::NotFound {
            entity: "booking",
            id: 999
        })
    );
    assert!(f.bus.published().is_empty());
}

#[tokio::test]
async fn reconfirming_republishes_and_confirmed_can_be_cancelled() {
    let f = fixture();
    let booking = f
        .services
        .bookings
        .create(CreateBooking {
            vehicle_id: VehicleId::new(3),
            user_id: UserId::new(1),
            start_date: date("2024-06-01"),
            end_date: date("2024-06-02"),
            daily_rate: Money::from_units(40),
        })
        .await
        .unwrap();

    f.services.bookings.confirm(booking.id).await.unwrap();
    let again = f.services.bookings.confirm(booking.id).await.unwrap();
    assert_eq!(again.status, BookingStatus::Confirmed);

    let cancelled = f.services.bookings.cancel(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let names: Vec<_> = f
        .bus
        .published_json(BOOKING_EVENTS)
        .into_iter()
        .map(|event| event["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        ["booking_created", "booking_confirmed", "booking_confirmed", "booking_cancelled"]
    );
}

#[tokio::test]
async fn bookings_list_in_creation_order() {
    let f = fixture();
    let user = UserId::new(8);
    let mut created = Vec::new();
    for vehicle in [1, 2, 3] {
        let booking = f
            .services
            .bookings
            .create(CreateBooking {
                vehicle_id: VehicleId::new(vehicle),
                user_id: user,
                start_date: date("2024-06-01"),
                end_date: date("2024-06-02"),
                daily_rate: Money::from_units(10),
            })
            .await
            .unwrap();
        created.push(booking.id);
    }

    let listed: Vec<_> = f
        .services
        .bookings
        .list_by_user(user)
        .await
        .unwrap()
        .into_iter()
        .map(|booking| booking.id)
        .collect();
    assert_eq!(listed, created);
}

#[tokio::test]
async fn negative_payment_is_rejected_before_storage() {
    let f = fixture();
    let result = f
        .services
        .payments
        .process(BookingId::new(5), Money::new(Decimal::from(-10)), "card")
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, RentalError::Validation(_)));
    assert_eq!(f.store.payment_count(), 0);
    assert!(f.bus.published().is_empty());
}

#[tokio::test]
async fn payment_completes_and_publishes() {
    let f = fixture();
    let payment = assert_ok!(
        f.services
            .payments
            .process(BookingId::new(5), Money::from_units(100), "card")
            .await
    );

    assert_eq!(
        f.services.payments.get(payment.id).await.unwrap().unwrap().status,
        rentflow_core::types::PaymentStatus::Completed
    );
    assert!(f.services.payments.get(PaymentId::new(404)).await.unwrap().is_none());

    let events = f.bus.published_json(PAYMENT_EVENTS);
    assert_eq!(
        events,
        vec![serde_json::json!({
            "event": "payment_completed",
            "paymentId": payment.id.value(),
            "bookingId": 5
        })]
    );
}

#[tokio::test]
async fn cache_miss_reads_once_then_serves_from_cache() {
    let f = fixture();
    f.store.seed_vehicle(berlin("Toyota"));
    f.store.seed_vehicle(berlin("Honda"));

    let first = f.services.availability.get_all().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(f.store.find_all_calls(), 1);

    let writes = f.kv.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].key, VEHICLES_CACHE_KEY);
    assert_eq!(writes[0].ttl, f.config.redis.cache_ttl());

    let second = f.services.availability.get_all().await.unwrap();
    assert_eq!(second, first);
    assert_eq!(f.store.find_all_calls(), 1);
}

#[tokio::test]
async fn search_excludes_locked_vehicle() {
    let f = fixture();
    let locked = f.store.seed_vehicle(berlin("Toyota"));
    let free = f.store.seed_vehicle(berlin("Honda"));
    f.kv.insert_raw(&lock_key(locked.id), "holder", Duration::from_secs(300));

    let found = f
        .services
        .availability
        .search(date("2024-06-01"), date("2024-06-03"), "Berlin")
        .await
        .unwrap();

    assert_eq!(found, vec![free]);
}

#[tokio::test]
async fn search_excludes_overlapping_booking_and_other_locations() {
    let f = fixture();
    let booked = f.store.seed_vehicle(berlin("Toyota"));
    let free = f.store.seed_vehicle(berlin("Honda"));
    f.store.seed_vehicle(VehicleDetails::new(
        "Fiat",
        "Panda",
        2020,
        "Munich",
        Money::from_units(30),
        "compact",
    ));

    let booking = f
        .services
        .bookings
        .create(CreateBooking {
            vehicle_id: booked.id,
            user_id: UserId::new(1),
            start_date: date("2024-06-02"),
            end_date: date("2024-06-04"),
            daily_rate: Money::from_units(50),
        })
        .await
        .unwrap();
    f.services.bookings.confirm(booking.id).await.unwrap();

    let found = f
        .services
        .availability
        .search(date("2024-06-01"), date("2024-06-02"), "Berlin")
        .await
        .unwrap();
    assert_eq!(found, vec![free]);
}

#[tokio::test]
async fn search_ignores_lock_store_outage() {
    let f = fixture();
    let vehicle = f.store.seed_vehicle(berlin("Toyota"));
    f.kv.set_unavailable(true);

    let found = f
        .services
        .availability
        .search(date("2024-06-01"), date("2024-06-03"), "Berlin")
        .await
        .unwrap();
    assert_eq!(found, vec![vehicle]);
}

#[tokio::test]
async fn vehicle_admin_keeps_snapshot_fresh() {
    let f = fixture();
    let availability = &f.services.availability;

    let vehicle = availability.add_vehicle(berlin("Toyota")).await.unwrap();
    let mut details = vehicle.details.clone();
    details.color = Some("red".to_string());
    availability.update_vehicle(vehicle.id, details).await.unwrap();

    let cached = availability.get_all().await.unwrap();
    assert_eq!(cached[0].details.color.as_deref(), Some("red"));
    assert_eq!(availability.get_vehicle(vehicle.id).await.unwrap(), Some(cached[0].clone()));

    availability.delete_vehicle(vehicle.id).await.unwrap();
    assert!(availability.get_all().await.unwrap().is_empty());
}
