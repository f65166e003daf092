//! Event bus abstraction for cross-service communication.
//!
//! Services never call each other. A state change is persisted by its owning
//! service, then announced on a topic; every downstream service consumes the
//! topic through its own consumer group and reacts independently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Booking service │
//! └────────┬────────┘
//!          │ 1. persist booking
//!          │ 2. publish booking_created
//!          ▼
//! ┌─────────────────┐
//! │   booking-events│◄─── At-least-once delivery
//! └────────┬────────┘
//!     ┌────┼──────────────┐
//!     ▼    ▼              ▼
//! availability  notification  websocket      (one consumer group each)
//! ```
//!
//! # Key Principles
//!
//! - **Persist first**: the triggering state change is stored before publishing
//! - **At-least-once delivery**: messages may be delivered more than once
//! - **Idempotency**: handlers must tolerate duplicates
//! - **Ordered per key**: messages sharing a key keep publish order; nothing
//!   else is ordered
//! - **Fan-out across groups, load-balanced within a group**
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `rentflow-testing` - for tests
//! - `RedpandaEventBus` in `rentflow-redpanda` - for production (Kafka-compatible)

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::event::{EventDecodeError, TopicEvent, encode};

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to encode an outbound message
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl From<EventDecodeError> for EventBusError {
    fn from(err: EventDecodeError) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// A message on the bus: raw JSON payload plus routing information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message is published to / was received from
    pub topic: String,
    /// Partition key; messages with the same key keep their order
    pub key: Option<String>,
    /// JSON payload
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Create a message without a partition key.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload,
        }
    }

    /// Set the partition key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Encode a topic event, keyed by its partition key.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError::Encode`] if the event cannot be serialized.
    pub fn from_event<E: TopicEvent>(event: &E) -> Result<Self, EventDecodeError> {
        Ok(Self::new(E::TOPIC, encode(event)?).with_key(event.partition_key()))
    }

    /// Payload as UTF-8 text, lossy, for logging.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Stream of messages from a subscription.
///
/// Transport errors are yielded inline; the stream keeps going after them.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<BusMessage, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Consumer Groups
///
/// `subscribe` takes the consumer group explicitly. Every distinct group
/// receives every message; subscribers sharing a group split the messages
/// between them.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so that services can hold an `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish a message (fire-and-forget from the caller's point of view).
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker rejects the message
    /// or cannot be reached.
    fn publish(
        &self,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to topics as a member of `group`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
        group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::{BOOKING_EVENTS, BookingEvent};
    use crate::types::BookingId;

    #[test]
    fn from_event_keys_by_booking() {
        let message = BusMessage::from_event(&BookingEvent::BookingConfirmed {
            booking_id: BookingId::new(42),
        })
        .unwrap();

        assert_eq!(message.topic, BOOKING_EVENTS);
        assert_eq!(message.key.as_deref(), Some("42"));
        assert_eq!(
            message.payload_text(),
            r#"{"event":"booking_confirmed","bookingId":42}"#
        );
    }
}
