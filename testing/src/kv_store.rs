//! In-memory key-value store with TTL.

use rentflow_core::kv_store::{KeyValueStore, KvError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    ttl: Duration,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// A completed `set_with_ttl` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvWrite {
    /// Key written
    pub key: String,
    /// TTL requested
    pub ttl: Duration,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    writes: Vec<KvWrite>,
}

/// In-memory [`KeyValueStore`].
///
/// Expiry is checked lazily on access. [`expire`](Self::expire) forces a key
/// past its TTL so tests never sleep; [`set_unavailable`](Self::set_unavailable)
/// makes every operation fail like an unreachable Redis.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    inner: Arc<Mutex<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle outage simulation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Write a raw value directly, bypassing the write log.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.inner.lock().unwrap().entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Force a key to expire now.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn expire(&self, key: &str) {
        if let Some(entry) = self.inner.lock().unwrap().entries.get_mut(key) {
            entry.expires_at = Instant::now();
        }
    }

    /// TTL a live key was written with.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.ttl)
    }

    /// Live value without going through the trait.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone())
    }

    /// Every `set_with_ttl` call, in order.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn writes(&self) -> Vec<KvWrite> {
        self.inner.lock().unwrap().writes.clone()
    }

    fn check_available(&self) -> Result<(), KvError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(KvError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn live_value(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get(key) {
            Some(entry) if entry.is_live() => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.check_available()?;
        Ok(self.live_value(key))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        inner.writes.push(KvWrite {
            key: key.to_string(),
            ttl,
        });
        Ok(())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.get(key).is_some_and(Entry::is_live) {
            return Ok(false);
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        self.check_available()?;
        let removed = self.inner.lock().unwrap().entries.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live()))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, KvError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let matches = inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live() && entry.value == expected);
        if matches {
            inner.entries.remove(key);
        }
        Ok(matches)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.check_available()?;
        Ok(self.live_value(key).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_if_absent_respects_live_keys_only() {
        let store = InMemoryKeyValueStore::new();
        assert!(store.set_if_absent("k", "a", TTL).await.unwrap());
        assert!(!store.set_if_absent("k", "b", TTL).await.unwrap());

        store.expire("k");
        assert!(store.set_if_absent("k", "c", TTL).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn delete_if_equals_compares_value() {
        let store = InMemoryKeyValueStore::new();
        store.set_with_ttl("k", "a", TTL).await.unwrap();

        assert!(!store.delete_if_equals("k", "b").await.unwrap());
        assert!(store.exists("k").await.unwrap());
        assert!(store.delete_if_equals("k", "a").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn outage_fails_every_operation() {
        let store = InMemoryKeyValueStore::new();
        store.set_unavailable(true);
        assert!(store.get("k").await.is_err());
        assert!(store.set_with_ttl("k", "v", TTL).await.is_err());
        assert!(store.exists("k").await.is_err());
        assert!(store.writes().is_empty());
    }
}
