//! # Rentflow Testing
//!
//! In-memory collaborators for testing the booking workflow without Redis,
//! Redpanda or `PostgreSQL`.
//!
//! This crate provides:
//! - [`InMemoryEventBus`]: consumer-group aware pub/sub with a publish log
//! - [`InMemoryKeyValueStore`]: TTL store with outage injection and write log
//! - [`InMemoryRentalStore`]: all four repositories, with read counters
//! - [`RecordingSession`]: live session that records frames
//! - [`FixedClock`]: deterministic time
//! - [`properties`]: proptest strategies for domain values
//!
//! ## Example
//!
//! ```ignore
//! use rentflow_testing::{InMemoryKeyValueStore, InMemoryRentalStore};
//!
//! #[tokio::test]
//! async fn cache_miss_reads_once() {
//!     let store = Arc::new(InMemoryRentalStore::new());
//!     let kv = Arc::new(InMemoryKeyValueStore::new());
//!     let cache = AvailabilityCache::new(store.clone(), kv.clone(), ttl);
//!
//!     cache.get_all().await?;
//!     assert_eq!(store.find_all_calls(), 1);
//! }
//! ```

mod event_bus;
mod kv_store;
mod session;
mod store;

pub use event_bus::InMemoryEventBus;
pub use kv_store::InMemoryKeyValueStore;
pub use session::RecordingSession;
pub use store::InMemoryRentalStore;

use chrono::{DateTime, Utc};
use rentflow_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`set`](Self::set).
    ///
    /// # Example
    ///
    /// ```
    /// use rentflow_testing::mocks::FixedClock;
    /// use rentflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Create a fixed clock from an RFC 3339 timestamp.
        ///
        /// # Panics
        ///
        /// Panics if `rfc3339` is not a valid timestamp.
        #[must_use]
        #[allow(clippy::expect_used)] // Test helper: a bad literal is a test bug
        pub fn at(rfc3339: &str) -> Self {
            Self::new(
                DateTime::parse_from_rfc3339(rfc3339)
                    .expect("test timestamp should parse")
                    .with_timezone(&Utc),
            )
        }

        /// Move the clock.
        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::at("2025-01-01T00:00:00Z")
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{Days, NaiveDate};
    use proptest::prelude::*;
    use rentflow_core::types::Money;
    use rust_decimal::Decimal;

    /// Inclusive date ranges with `start <= end`, up to a year long.
    pub fn date_range() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
        (0u64..3650, 0u64..366).prop_filter_map("date out of range", |(offset, length)| {
            let base = NaiveDate::from_ymd_opt(2020, 1, 1)?;
            let start = base.checked_add_days(Days::new(offset))?;
            let end = start.checked_add_days(Days::new(length))?;
            Some((start, end))
        })
    }

    /// Positive daily rates with cent precision.
    pub fn daily_rate() -> impl Strategy<Value = Money> {
        (1i64..1_000_000).prop_map(|cents| Money::new(Decimal::new(cents, 2)))
    }
}

/// Install a `tracing` subscriber for test output; repeated calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
