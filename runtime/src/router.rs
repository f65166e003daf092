//! Event router: decode, then dispatch by `(topic, event)`.
//!
//! The router is the [`MessageHandler`] every consumer group installs. It
//! decodes the payload with the topic's schema and calls the matching named
//! method on a [`RentalEventHandler`]:
//!
//! | topic            | event               | method                |
//! |------------------|---------------------|-----------------------|
//! | `booking-events` | `booking_created`   | `booking_created`     |
//! | `booking-events` | `booking_confirmed` | `booking_confirmed`   |
//! | `booking-events` | `booking_cancelled` | `booking_cancelled`   |
//! | `payment-events` | `payment_completed` | `payment_completed`   |
//! | `payment-events` | `payment_failed`    | `payment_failed`      |
//! | `payment-events` | `payment_refunded`  | `payment_refunded`    |
//!
//! Unknown discriminators are ignored. Malformed payloads are logged and
//! skipped; they never reach the handler and never fail the consumer.

use crate::consumer::{HandlerError, MessageHandler};
use crate::metrics::EventMetrics;
use async_trait::async_trait;
use rentflow_core::event::{BookingEvent, PaymentEvent, RentalEvent};
use rentflow_core::event_bus::BusMessage;
use rentflow_core::types::{BookingId, PaymentId, UserId, VehicleId};
use std::sync::Arc;

/// Named reactions to workflow events.
///
/// Every method defaults to a no-op so each downstream service implements
/// only the events it cares about.
#[async_trait]
pub trait RentalEventHandler: Send + Sync + 'static {
    /// `booking-events` / `booking_created`
    async fn booking_created(
        &self,
        _booking_id: BookingId,
        _vehicle_id: VehicleId,
        _user_id: UserId,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `booking-events` / `booking_confirmed`
    async fn booking_confirmed(&self, _booking_id: BookingId) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `booking-events` / `booking_cancelled`
    async fn booking_cancelled(&self, _booking_id: BookingId) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `payment-events` / `payment_completed`
    async fn payment_completed(
        &self,
        _payment_id: PaymentId,
        _booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `payment-events` / `payment_failed`
    async fn payment_failed(
        &self,
        _payment_id: PaymentId,
        _booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `payment-events` / `payment_refunded`
    async fn payment_refunded(
        &self,
        _payment_id: PaymentId,
        _booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Decodes bus messages and dispatches them to a [`RentalEventHandler`].
pub struct EventRouter<H> {
    handler: Arc<H>,
}

impl<H: RentalEventHandler> EventRouter<H> {
    /// Route to `handler`.
    #[must_use]
    pub const fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Dispatch an already-decoded event.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn dispatch(&self, event: &RentalEvent) -> Result<(), HandlerError> {
        EventMetrics::record_dispatched(event.event_name());
        match event {
            RentalEvent::Booking(event) => self.dispatch_booking(event).await,
            RentalEvent::Payment(event) => self.dispatch_payment(event).await,
        }
    }

    async fn dispatch_booking(&self, event: &BookingEvent) -> Result<(), HandlerError> {
        match *event {
            BookingEvent::BookingCreated {
                booking_id,
                vehicle_id,
                user_id,
            } => {
                self.handler
                    .booking_created(booking_id, vehicle_id, user_id)
                    .await
            }
            BookingEvent::BookingConfirmed { booking_id } => {
                self.handler.booking_confirmed(booking_id).await
            }
            BookingEvent::BookingCancelled { booking_id } => {
                self.handler.booking_cancelled(booking_id).await
            }
        }
    }

    async fn dispatch_payment(&self, event: &PaymentEvent) -> Result<(), HandlerError> {
        match *event {
            PaymentEvent::PaymentCompleted {
                payment_id,
                booking_id,
            } => self.handler.payment_completed(payment_id, booking_id).await,
            PaymentEvent::PaymentFailed {
                payment_id,
                booking_id,
            } => self.handler.payment_failed(payment_id, booking_id).await,
            PaymentEvent::PaymentRefunded {
                payment_id,
                booking_id,
            } => self.handler.payment_refunded(payment_id, booking_id).await,
        }
    }
}

#[async_trait]
impl<H: RentalEventHandler> MessageHandler for EventRouter<H> {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        match RentalEvent::decode(&message.topic, &message.payload) {
            Ok(Some(event)) => {
                tracing::debug!(topic = %message.topic, event = event.event_name(), "Dispatching event");
                self.dispatch(&event).await
            }
            Ok(None) => {
                EventMetrics::record_ignored();
                tracing::debug!(
                    topic = %message.topic,
                    payload = %message.payload_text(),
                    "Ignoring event with unknown discriminator"
                );
                Ok(())
            }
            Err(e) => {
                EventMetrics::record_malformed();
                tracing::warn!(
                    topic = %message.topic,
                    payload = %message.payload_text(),
                    error = %e,
                    "Skipping malformed event"
                );
                Ok(())
            }
        }
    }
}
