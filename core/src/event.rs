//! Event envelopes carried on the event bus.
//!
//! Each topic carries JSON objects with a mandatory `event` discriminator and
//! event-specific camelCase fields:
//!
//! ```text
//! booking-events:  {"event":"booking_created","bookingId":5,"vehicleId":7,"userId":1}
//!                  {"event":"booking_confirmed","bookingId":5}
//!                  {"event":"booking_cancelled","bookingId":5}
//! payment-events:  {"event":"payment_completed","paymentId":9,"bookingId":5}
//!                  {"event":"payment_failed","paymentId":9,"bookingId":5}
//!                  {"event":"payment_refunded","paymentId":9,"bookingId":5}
//! ```
//!
//! One sum type per topic, one variant per discriminator. Decoding fails
//! closed: an unknown discriminator decodes to `Ok(None)` (forward-compatible
//! no-op), a known discriminator with missing or mistyped fields is an
//! [`EventDecodeError`]. Neither case may crash a consumer.

use crate::types::{BookingId, PaymentId, UserId, VehicleId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topic carrying booking lifecycle events.
pub const BOOKING_EVENTS: &str = "booking-events";

/// Topic carrying payment lifecycle events.
pub const PAYMENT_EVENTS: &str = "payment-events";

/// Errors decoding or encoding an event payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    /// Payload is not a JSON object with a string `event` field.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Discriminator is known but the payload does not match its shape.
    #[error("Malformed '{event}' payload: {reason}")]
    MalformedPayload {
        /// The discriminator value
        event: String,
        /// Underlying parse error
        reason: String,
    },

    /// Topic has no event schema.
    #[error("No event schema for topic '{0}'")]
    UnknownTopic(String),

    /// Serialization failed while encoding.
    #[error("Failed to encode event: {0}")]
    Encode(String),
}

/// Events on a single topic.
///
/// Implemented by one enum per topic. `EVENT_NAMES` lists every
/// discriminator the enum understands; anything else is ignored on decode.
pub trait TopicEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Topic these events are published to.
    const TOPIC: &'static str;

    /// Discriminators known to this schema.
    const EVENT_NAMES: &'static [&'static str];

    /// The `event` discriminator of this value.
    fn event_name(&self) -> &'static str;

    /// Partition key. Events sharing a key are delivered in publish order.
    fn partition_key(&self) -> String;
}

/// Booking lifecycle events (`booking-events`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A PENDING booking was created.
    #[serde(rename_all = "camelCase")]
    BookingCreated {
        /// New booking
        booking_id: BookingId,
        /// Booked vehicle
        vehicle_id: VehicleId,
        /// Owning user
        user_id: UserId,
    },
    /// A booking was confirmed.
    #[serde(rename_all = "camelCase")]
    BookingConfirmed {
        /// Confirmed booking
        booking_id: BookingId,
    },
    /// A booking was cancelled.
    #[serde(rename_all = "camelCase")]
    BookingCancelled {
        /// Cancelled booking
        booking_id: BookingId,
    },
}

impl BookingEvent {
    /// The booking this event is about.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::BookingCreated { booking_id, .. }
            | Self::BookingConfirmed { booking_id }
            | Self::BookingCancelled { booking_id } => *booking_id,
        }
    }
}

impl TopicEvent for BookingEvent {
    const TOPIC: &'static str = BOOKING_EVENTS;
    const EVENT_NAMES: &'static [&'static str] =
        &["booking_created", "booking_confirmed", "booking_cancelled"];

    fn event_name(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "booking_created",
            Self::BookingConfirmed { .. } => "booking_confirmed",
            Self::BookingCancelled { .. } => "booking_cancelled",
        }
    }

    fn partition_key(&self) -> String {
        self.booking_id().to_string()
    }
}

/// Payment lifecycle events (`payment-events`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Payment settled.
    #[serde(rename_all = "camelCase")]
    PaymentCompleted {
        /// Payment
        payment_id: PaymentId,
        /// Booking paid for
        booking_id: BookingId,
    },
    /// Payment was declined.
    #[serde(rename_all = "camelCase")]
    PaymentFailed {
        /// Payment
        payment_id: PaymentId,
        /// Booking paid for
        booking_id: BookingId,
    },
    /// Payment was refunded.
    #[serde(rename_all = "camelCase")]
    PaymentRefunded {
        /// Payment
        payment_id: PaymentId,
        /// Booking paid for
        booking_id: BookingId,
    },
}

impl PaymentEvent {
    /// The payment this event is about.
    #[must_use]
    pub const fn payment_id(&self) -> PaymentId {
        match self {
            Self::PaymentCompleted { payment_id, .. }
            | Self::PaymentFailed { payment_id, .. }
            | Self::PaymentRefunded { payment_id, .. } => *payment_id,
        }
    }

    /// The booking the payment belongs to.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::PaymentCompleted { booking_id, .. }
            | Self::PaymentFailed { booking_id, .. }
            | Self::PaymentRefunded { booking_id, .. } => *booking_id,
        }
    }
}

impl TopicEvent for PaymentEvent {
    const TOPIC: &'static str = PAYMENT_EVENTS;
    const EVENT_NAMES: &'static [&'static str] =
        &["payment_completed", "payment_failed", "payment_refunded"];

    fn event_name(&self) -> &'static str {
        match self {
            Self::PaymentCompleted { .. } => "payment_completed",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::PaymentRefunded { .. } => "payment_refunded",
        }
    }

    fn partition_key(&self) -> String {
        self.booking_id().to_string()
    }
}

/// Any event the workflow understands, tagged by topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RentalEvent {
    /// From `booking-events`
    Booking(BookingEvent),
    /// From `payment-events`
    Payment(PaymentEvent),
}

impl RentalEvent {
    /// Decode a payload received on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError::UnknownTopic`] for topics without a schema,
    /// or the decode error of the topic's schema.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Option<Self>, EventDecodeError> {
        match topic {
            BOOKING_EVENTS => Ok(decode::<BookingEvent>(payload)?.map(Self::Booking)),
            PAYMENT_EVENTS => Ok(decode::<PaymentEvent>(payload)?.map(Self::Payment)),
            other => Err(EventDecodeError::UnknownTopic(other.to_string())),
        }
    }

    /// The `event` discriminator.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Booking(event) => event.event_name(),
            Self::Payment(event) => event.event_name(),
        }
    }
}

/// Envelope probe: only the discriminator.
#[derive(Deserialize)]
struct Discriminator {
    event: String,
}

/// Decode a payload into a topic's event enum.
///
/// Returns `Ok(None)` when the discriminator is not one of
/// `E::EVENT_NAMES`.
///
/// # Errors
///
/// - [`EventDecodeError::MalformedEnvelope`] when the payload is not JSON or
///   has no string `event` field
/// - [`EventDecodeError::MalformedPayload`] when a known event is missing
///   required fields
pub fn decode<E: TopicEvent>(payload: &[u8]) -> Result<Option<E>, EventDecodeError> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| EventDecodeError::MalformedEnvelope(e.to_string()))?;

    let Discriminator { event } = Discriminator::deserialize(&value)
        .map_err(|e| EventDecodeError::MalformedEnvelope(e.to_string()))?;

    if !E::EVENT_NAMES.contains(&event.as_str()) {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| EventDecodeError::MalformedPayload {
            event,
            reason: e.to_string(),
        })
}

/// Encode an event to its JSON wire form.
///
/// # Errors
///
/// Returns [`EventDecodeError::Encode`] if serialization fails.
pub fn encode<E: TopicEvent>(event: &E) -> Result<Vec<u8>, EventDecodeError> {
    serde_json::to_vec(event).map_err(|e| EventDecodeError::Encode(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn booking_created_matches_wire_format() {
        let event = BookingEvent::BookingCreated {
            booking_id: BookingId::new(5),
            vehicle_id: VehicleId::new(7),
            user_id: UserId::new(1),
        };

        let json: serde_json::Value = serde_json::from_slice(&encode(&event).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event":"booking_created","bookingId":5,"vehicleId":7,"userId":1})
        );
    }

    #[test]
    fn decodes_payment_event_from_producer_text() {
        let payload = br#"{"event":"payment_refunded","paymentId":9,"bookingId":5}"#;

        let event = decode::<PaymentEvent>(payload).unwrap().unwrap();
        assert_eq!(
            event,
            PaymentEvent::PaymentRefunded {
                payment_id: PaymentId::new(9),
                booking_id: BookingId::new(5),
            }
        );
    }

    #[test]
    fn unknown_discriminator_is_ignored() {
        let payload = br#"{"event":"booking_extended","bookingId":5}"#;
        assert_eq!(decode::<BookingEvent>(payload).unwrap(), None);
    }

    #[test]
    fn missing_field_is_malformed() {
        let payload = br#"{"event":"booking_created","bookingId":5}"#;
        let err = decode::<BookingEvent>(payload).unwrap_err();
        assert!(matches!(err, EventDecodeError::MalformedPayload { ref event, .. } if event == "booking_created"));
    }

    #[test]
    fn missing_discriminator_is_malformed_envelope() {
        assert!(matches!(
            decode::<BookingEvent>(br#"{"bookingId":5}"#),
            Err(EventDecodeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode::<BookingEvent>(b"not json"),
            Err(EventDecodeError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let payload = br#"{"event":"booking_confirmed","bookingId":5,"source":"admin"}"#;
        let event = decode::<BookingEvent>(payload).unwrap().unwrap();
        assert_eq!(event.booking_id(), BookingId::new(5));
    }

    #[test]
    fn rental_event_routes_by_topic() {
        let payload = br#"{"event":"booking_cancelled","bookingId":3}"#;
        let event = RentalEvent::decode(BOOKING_EVENTS, payload).unwrap().unwrap();
        assert_eq!(event.event_name(), "booking_cancelled");

        assert!(matches!(
            RentalEvent::decode("vehicle-events", payload),
            Err(EventDecodeError::UnknownTopic(_))
        ));
    }
}
