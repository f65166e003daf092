//! Shared fixture: every service wired over in-memory collaborators.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDate;
use rentflow_rental::{Config, RentalServices};
use rentflow_testing::{
    InMemoryEventBus, InMemoryKeyValueStore, InMemoryRentalStore, test_clock,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct Fixture {
    pub services: RentalServices<InMemoryRentalStore, InMemoryKeyValueStore>,
    pub store: InMemoryRentalStore,
    pub kv: InMemoryKeyValueStore,
    pub bus: InMemoryEventBus,
    pub config: Config,
}

pub fn fixture() -> Fixture {
    let store = InMemoryRentalStore::new();
    let kv = InMemoryKeyValueStore::new();
    let bus = InMemoryEventBus::new();
    let mut config = Config::default();
    config.redpanda.retry_delay_secs = 0;

    let services = RentalServices::new(
        Arc::new(store.clone()),
        Arc::new(kv.clone()),
        Arc::new(bus.clone()),
        Arc::new(test_clock()),
        &config,
    );

    Fixture {
        services,
        store,
        kv,
        bus,
        config,
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
