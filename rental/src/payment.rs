//! Payment processing.
//!
//! Gateway integration is out of scope: a payment settles immediately and is
//! recorded COMPLETED in a single write, so no PENDING row is ever left behind.
//! Refunds are compare-and-set on the stored status.

use crate::error::{RentalError, Result};
use crate::publisher::EventPublisher;
use rentflow_core::event::PaymentEvent;
use rentflow_core::repository::PaymentRepository;
use rentflow_core::types::{BookingId, Money, NewPayment, Payment, PaymentId, PaymentStatus};
use std::sync::Arc;
use tracing::info;

/// Records payments against bookings and publishes `payment-events`.
pub struct PaymentService<R> {
    payments: Arc<R>,
    publisher: EventPublisher,
}

impl<R: PaymentRepository> PaymentService<R> {
    /// Wire the service.
    #[must_use]
    pub const fn new(payments: Arc<R>, publisher: EventPublisher) -> Self {
        Self {
            payments,
            publisher,
        }
    }

    /// Charge `amount` for a booking and publish `payment_completed`.
    ///
    /// # Errors
    ///
    /// - [`RentalError::Validation`] if `amount` is not positive; nothing is stored
    /// - [`RentalError::Repository`] on store failure
    pub async fn process(
        &self,
        booking_id: BookingId,
        amount: Money,
        payment_method: impl Into<String>,
    ) -> Result<Payment> {
        if !amount.is_positive() {
            return Err(RentalError::Validation(format!(
                "payment amount must be greater than zero, got {amount}"
            )));
        }

        let payment = self
            .payments
            .insert(NewPayment {
                booking_id,
                amount,
                payment_method: payment_method.into(),
                status: PaymentStatus::Completed,
            })
            .await?;
        info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            amount = %amount,
            "Payment completed"
        );

        self.publisher
            .publish(&PaymentEvent::PaymentCompleted {
                payment_id: payment.id,
                booking_id,
            })
            .await;

        Ok(payment)
    }

    /// Look up a payment.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.find_by_id(payment_id).await?)
    }

    /// Payments made for a booking.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn list_by_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        Ok(self.payments.find_by_booking(booking_id).await?)
    }

    /// Refund a completed payment and publish `payment_refunded`.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] if the payment does not exist
    /// - [`RentalError::InvalidTransition`] unless it is COMPLETED
    /// - [`RentalError::Repository`] on store failure
    pub async fn refund(&self, payment_id: PaymentId) -> Result<Payment> {
        let mut payment = self.find(payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(Self::not_refundable(&payment));
        }

        let refunded = self
            .payments
            .update_status(payment_id, PaymentStatus::Completed, PaymentStatus::Refunded)
            .await?;
        if !refunded {
            // another refund got there first
            return Err(Self::not_refundable(&self.find(payment_id).await?));
        }

        payment.status = PaymentStatus::Refunded;
        info!(payment_id = %payment_id, booking_id = %payment.booking_id, "Payment refunded");

        self.publisher
            .publish(&PaymentEvent::PaymentRefunded {
                payment_id,
                booking_id: payment.booking_id,
            })
            .await;

        Ok(payment)
    }

    async fn find(&self, payment_id: PaymentId) -> Result<Payment> {
        self.payments
            .find_by_id(payment_id)
            .await?
            .ok_or(RentalError::NotFound {
                entity: "payment",
                id: payment_id.value(),
            })
    }

    const fn not_refundable(payment: &Payment) -> RentalError {
        RentalError::InvalidTransition {
            from: payment.status.as_str(),
            to: PaymentStatus::Refunded.as_str(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rentflow_core::event::PAYMENT_EVENTS;
    use rentflow_testing::{InMemoryEventBus, InMemoryRentalStore};

    fn service() -> (PaymentService<InMemoryRentalStore>, InMemoryEventBus) {
        let bus = InMemoryEventBus::new();
        let service = PaymentService::new(
            Arc::new(InMemoryRentalStore::new()),
            EventPublisher::new(Arc::new(bus.clone())),
        );
        (service, bus)
    }

    #[tokio::test]
    async fn refund_only_from_completed() {
        let (service, bus) = service();
        let payment = service
            .process(BookingId::new(5), Money::from_units(100), "card")
            .await
            .unwrap();

        let refunded = service.refund(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);

        let again = service.refund(payment.id).await;
        assert_eq!(
            again,
            Err(RentalError::InvalidTransition {
                from: "REFUNDED",
                to: "REFUNDED"
            })
        );

        let events = bus.published_json(PAYMENT_EVENTS);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["event"], "payment_refunded");
        assert_eq!(events[1]["bookingId"], 5);
    }

    #[tokio::test]
    async fn refund_of_unknown_payment_is_not_found() {
        let (service, bus) = service();
        let result = service.refund(PaymentId::new(404)).await;
        assert_eq!(
            result,
            Err(RentalError::NotFound {
                entity: "payment",
                id: 404
            })
        );
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let (service, _) = service();
        let result = service.process(BookingId::new(5), Money::ZERO, "card").await;
        assert!(matches!(result, Err(RentalError::Validation(_))));
        assert!(service.list_by_booking(BookingId::new(5)).await.unwrap().is_empty());
    }

    /// Payment store that records inserted statuses and yields after every
    /// read so concurrent refunds interleave.
    #[derive(Default)]
    struct SlowPayments {
        store: InMemoryRentalStore,
        inserted: std::sync::Mutex<Vec<PaymentStatus>>,
    }

    impl PaymentRepository for SlowPayments {
        async fn find_by_id(
            &self,
            id: PaymentId,
        ) -> rentflow_core::repository::Result<Option<Payment>> {
            let found = self.store.find_by_id(id).await?;
            tokio::task::yield_now().await;
            Ok(found)
        }

        async fn find_by_booking(
            &self,
            booking_id: BookingId,
        ) -> rentflow_core::repository::Result<Vec<Payment>> {
            self.store.find_by_booking(booking_id).await
        }

        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        async fn insert(&self, payment: NewPayment) -> rentflow_core::repository::Result<Payment> {
            self.inserted.lock().unwrap().push(payment.status);
            self.store.insert(payment).await
        }

        async fn update_status(
            &self,
            id: PaymentId,
            expected: PaymentStatus,
            next: PaymentStatus,
        ) -> rentflow_core::repository::Result<bool> {
            self.store.update_status(id, expected, next).await
        }
    }

    fn slow_service() -> (
        Arc<SlowPayments>,
        PaymentService<SlowPayments>,
        InMemoryEventBus,
    ) {
        let payments = Arc::new(SlowPayments::default());
        let bus = InMemoryEventBus::new();
        let service = PaymentService::new(
            Arc::clone(&payments),
            EventPublisher::new(Arc::new(bus.clone())),
        );
        (payments, service, bus)
    }

    #[tokio::test]
    async fn payment_is_recorded_completed_in_one_write() {
        let (payments, service, _) = slow_service();
        service
            .process(BookingId::new(5), Money::from_units(100), "card")
            .await
            .unwrap();

        assert_eq!(*payments.inserted.lock().unwrap(), [PaymentStatus::Completed]);
    }

    #[tokio::test]
    async fn concurrent_refunds_refund_once() {
        let (_, service, bus) = slow_service();
        let payment = service
            .process(BookingId::new(5), Money::from_units(100), "card")
            .await
            .unwrap();

        let (first, second) = tokio::join!(service.refund(payment.id), service.refund(payment.id));

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.contains(&Err(RentalError::InvalidTransition {
            from: "REFUNDED",
            to: "REFUNDED"
        })));

        let refunds = bus
            .published_json(PAYMENT_EVENTS)
            .into_iter()
            .filter(|event| event["event"] == "payment_refunded")
            .count();
        assert_eq!(refunds, 1);
    }
}
