//! Fire-and-forget event publishing.

use rentflow_core::event::TopicEvent;
use rentflow_core::event_bus::{BusMessage, EventBus};
use rentflow_runtime::metrics::EventMetrics;
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes workflow events after the triggering state change is stored.
///
/// Failures are logged and counted, never returned: the caller's write has
/// already been persisted and must not be reported as failed.
#[derive(Clone)]
pub struct EventPublisher {
    event_bus: Arc<dyn EventBus>,
}

impl EventPublisher {
    /// Publish through `event_bus`.
    #[must_use]
    pub fn new(event_bus: Arc<dyn EventBus>) -> Self {
        Self { event_bus }
    }

    /// Publish `event` keyed by its partition key. Returns whether the bus
    /// accepted it.
    pub async fn publish<E: TopicEvent>(&self, event: &E) -> bool {
        let name = event.event_name();
        let message = match BusMessage::from_event(event) {
            Ok(message) => message,
            Err(e) => {
                warn!(event = name, error = %e, "Failed to encode event");
                EventMetrics::record_publish_failed(name);
                return false;
            }
        };

        match self.event_bus.publish(&message).await {
            Ok(()) => {
                EventMetrics::record_published(name);
                debug!(event = name, topic = %message.topic, key = ?message.key, "Event published");
                true
            }
            Err(e) => {
                EventMetrics::record_publish_failed(name);
                warn!(event = name, error = %e, "Event publish failed, state change kept");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rentflow_core::event::{BOOKING_EVENTS, BookingEvent};
    use rentflow_core::types::BookingId;
    use rentflow_testing::InMemoryEventBus;

    #[tokio::test]
    async fn publishes_keyed_by_booking() {
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(Arc::new(bus.clone()));

        assert!(
            publisher
                .publish(&BookingEvent::BookingConfirmed {
                    booking_id: BookingId::new(3)
                })
                .await
        );

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, BOOKING_EVENTS);
        assert_eq!(published[0].key.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn bus_outage_is_swallowed() {
        let bus = InMemoryEventBus::new();
        bus.set_publish_failure(true);
        let publisher = EventPublisher::new(Arc::new(bus.clone()));

        assert!(
            !publisher
                .publish(&BookingEvent::BookingCancelled {
                    booking_id: BookingId::new(3)
                })
                .await
        );
    }
}
