//! Tests against a live Redis.
//!
//! ```bash
//! REDIS_URL=redis://127.0.0.1:6379 cargo test -p rentflow-redis -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use rentflow_core::kv_store::KeyValueStore;
use rentflow_redis::RedisKeyValueStore;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30);

async fn store() -> RedisKeyValueStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisKeyValueStore::new(&url).await.unwrap()
}

fn key() -> String {
    format!("test:{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn set_if_absent_is_exclusive() {
    let store = store().await;
    let key = key();

    assert!(store.set_if_absent(&key, "a", TTL).await.unwrap());
    assert!(!store.set_if_absent(&key, "b", TTL).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("a"));

    assert!(store.delete(&key).await.unwrap());
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn compare_and_delete_checks_value() {
    let store = store().await;
    let key = key();
    store.set_with_ttl(&key, "owner", TTL).await.unwrap();

    assert!(!store.delete_if_equals(&key, "intruder").await.unwrap());
    assert!(store.exists(&key).await.unwrap());
    assert!(store.delete_if_equals(&key, "owner").await.unwrap());
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn keys_expire_after_ttl() {
    let store = store().await;
    let key = key();
    store.set_if_absent(&key, "x", Duration::from_secs(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!store.exists(&key).await.unwrap());
}
