//! # Rentflow Core
//!
//! Domain types and collaborator traits for the Rentflow vehicle-rental
//! booking workflow.
//!
//! This crate has no I/O of its own. It defines what flows between the
//! services (entities, event envelopes) and the seams where infrastructure
//! is plugged in:
//!
//! - [`event_bus::EventBus`]: durable, partitioned pub/sub (Redpanda in production)
//! - [`kv_store::KeyValueStore`]: shared store with TTL (Redis in production)
//! - [`repository`]: durable record stores (`PostgreSQL` in production)
//! - [`session::LiveSession`]: push channel to one connected client
//! - [`environment::Clock`]: wall-clock time
//!
//! ## Architecture Principles
//!
//! - Persist first, then announce
//! - Services never call each other; they react to events
//! - Infrastructure failures on the side paths (lock, cache, bus) degrade,
//!   they do not fail the request

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod event;
pub mod event_bus;
pub mod kv_store;
pub mod repository;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use rust_decimal::Decimal;

/// Environment module - Dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
