//! # Rentflow Runtime
//!
//! The distributed-consistency machinery of the booking workflow, independent
//! of any concrete broker, store or transport:
//!
//! - [`lock::ReservationLock`]: TTL-bounded, best-effort exclusion per vehicle
//! - [`router::EventRouter`]: decode an event and dispatch it by `(topic, event)`
//! - [`consumer::EventConsumer`]: subscribe-process-reconnect loop for one consumer group
//! - [`broadcast::Broadcaster`]: registry of live sessions and fanout of status updates
//! - [`metrics::MetricsServer`]: Prometheus exporter
//!
//! ## Example
//!
//! ```ignore
//! use rentflow_runtime::{EventConsumer, EventRouter};
//!
//! let router = Arc::new(EventRouter::new(Arc::new(LiveUpdateHandler::new(broadcaster))));
//! let handle = EventConsumer::builder()
//!     .name("websocket")
//!     .topics(vec!["booking-events".into(), "payment-events".into()])
//!     .group("websocket-service")
//!     .event_bus(bus)
//!     .handler(router)
//!     .shutdown(shutdown_rx)
//!     .build()?
//!     .spawn();
//! ```

/// Fanout of live status updates
pub mod broadcast;

/// Generic event bus consumer with reconnection
pub mod consumer;

/// Per-vehicle reservation lock
pub mod lock;

/// Prometheus metrics for observability
pub mod metrics;

/// Event decode and dispatch
pub mod router;

pub use broadcast::{Broadcaster, LiveStatus, LiveUpdate, LiveUpdateHandler};
pub use consumer::{EventConsumer, HandlerError, MessageHandler};
pub use lock::{LockError, LockToken, ReservationLock};
pub use router::{EventRouter, RentalEventHandler};
