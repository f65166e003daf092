//! Service wiring and consumer setup.
//!
//! [`RentalServices`] is generic over the durable store and the key-value
//! store, so the server binary runs it over Postgres and Redis while tests
//! run the same wiring over the in-memory collaborators.

use crate::availability::AvailabilityCache;
use crate::booking::BookingService;
use crate::config::{Config, RedpandaConfig};
use crate::handlers::{AvailabilityRefreshHandler, NotificationHandler};
use crate::notification::NotificationService;
use crate::payment::PaymentService;
use crate::publisher::EventPublisher;
use rentflow_core::environment::Clock;
use rentflow_core::event::{BOOKING_EVENTS, PAYMENT_EVENTS};
use rentflow_core::event_bus::EventBus;
use rentflow_core::kv_store::KeyValueStore;
use rentflow_core::repository::{
    BookingRepository, NotificationRepository, PaymentRepository, VehicleRepository,
};
use rentflow_runtime::consumer::ConsumerBuildError;
use rentflow_runtime::{
    Broadcaster, EventConsumer, EventRouter, LiveUpdateHandler, MessageHandler, RentalEventHandler,
    ReservationLock,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A durable store serving every repository.
pub trait RentalStore:
    VehicleRepository + BookingRepository + PaymentRepository + NotificationRepository + 'static
{
}

impl<T> RentalStore for T where
    T: VehicleRepository + BookingRepository + PaymentRepository + NotificationRepository + 'static
{
}

/// Every service of one process, sharing stores, bus and clock.
pub struct RentalServices<S, K> {
    /// Booking state machine
    pub bookings: Arc<BookingService<S, K>>,
    /// Payment processing
    pub payments: Arc<PaymentService<S>>,
    /// Vehicle cache, search and admin
    pub availability: Arc<AvailabilityCache<S, K>>,
    /// User notifications
    pub notifications: Arc<NotificationService<S>>,
    /// Live session registry
    pub broadcaster: Arc<Broadcaster>,
    store: Arc<S>,
    event_bus: Arc<dyn EventBus>,
}

impl<S: RentalStore, K: KeyValueStore + 'static> RentalServices<S, K> {
    /// Build every service over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        kv_store: Arc<K>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let lock = ReservationLock::new(Arc::clone(&kv_store), config.redis.lock_ttl());
        let publisher = EventPublisher::new(Arc::clone(&event_bus));

        Self {
            bookings: Arc::new(BookingService::new(
                Arc::clone(&store),
                lock.clone(),
                publisher.clone(),
                Arc::clone(&clock),
            )),
            payments: Arc::new(PaymentService::new(Arc::clone(&store), publisher)),
            availability: Arc::new(AvailabilityCache::new(
                Arc::clone(&store),
                kv_store,
                lock,
                config.redis.cache_ttl(),
            )),
            notifications: Arc::new(NotificationService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
            )),
            broadcaster: Arc::new(Broadcaster::new(clock)),
            store,
            event_bus,
        }
    }

    /// One consumer per downstream service, each under its own group:
    ///
    /// | consumer       | topics                   | reaction            |
    /// |----------------|--------------------------|---------------------|
    /// | `availability` | booking                  | refresh cache       |
    /// | `notification` | booking, payment         | write notification  |
    /// | `websocket`    | booking, payment         | broadcast update    |
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerBuildError`] if a consumer is missing configuration.
    pub fn consumers(
        &self,
        config: &RedpandaConfig,
        shutdown: &broadcast::Sender<()>,
    ) -> Result<Vec<EventConsumer>, ConsumerBuildError> {
        let availability = AvailabilityRefreshHandler::new(Arc::clone(&self.availability));
        let notification =
            NotificationHandler::new(Arc::clone(&self.notifications), Arc::clone(&self.store));
        let websocket = LiveUpdateHandler::new(Arc::clone(&self.broadcaster));

        Ok(vec![
            self.consumer(
                "availability",
                &[BOOKING_EVENTS],
                &config.availability_group,
                availability,
                config,
                shutdown,
            )?,
            self.consumer(
                "notification",
                &[BOOKING_EVENTS, PAYMENT_EVENTS],
                &config.notification_group,
                notification,
                config,
                shutdown,
            )?,
            self.consumer(
                "websocket",
                &[BOOKING_EVENTS, PAYMENT_EVENTS],
                &config.websocket_group,
                websocket,
                config,
                shutdown,
            )?,
        ])
    }

    fn consumer<H: RentalEventHandler>(
        &self,
        name: &str,
        topics: &[&str],
        group: &str,
        handler: H,
        config: &RedpandaConfig,
        shutdown: &broadcast::Sender<()>,
    ) -> Result<EventConsumer, ConsumerBuildError> {
        let router: Arc<dyn MessageHandler> = Arc::new(EventRouter::new(Arc::new(handler)));
        EventConsumer::builder()
            .name(name)
            .topics(topics.iter().map(ToString::to_string).collect())
            .group(group)
            .event_bus(Arc::clone(&self.event_bus))
            .handler(router)
            .shutdown(shutdown.subscribe())
            .retry_delay(config.retry_delay())
            .build()
    }
}
