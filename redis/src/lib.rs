//! Redis-backed key-value store.
//!
//! Implements [`KeyValueStore`] for the reservation lock
//! (`vehicle:lock:{id}`) and the availability cache (`vehicles:all`).
//!
//! # Atomicity
//!
//! - `set_if_absent` is a single `SET key value NX EX ttl`
//! - `delete_if_equals` is a Lua compare-and-delete, run server-side
//! - Expiry is Redis TTL; no client-side bookkeeping
//!
//! # Example
//!
//! ```no_run
//! use rentflow_redis::RedisKeyValueStore;
//! use rentflow_core::kv_store::KeyValueStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisKeyValueStore::new("redis://127.0.0.1:6379").await?;
//!
//! let acquired = store
//!     .set_if_absent("vehicle:lock:7", "token", Duration::from_secs(300))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use rentflow_core::kv_store::{KeyValueStore, KvError};
use std::time::Duration;

/// Deletes `KEYS[1]` only while it holds `ARGV[1]`.
const COMPARE_AND_DELETE: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
";

/// `Redis`-based key-value store.
///
/// This type is `Clone`; clones share the same `ConnectionManager`.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn_manager: ConnectionManager,
    compare_and_delete: Script,
}

impl RedisKeyValueStore {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unavailable`] if the URL is malformed or the
    /// connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, KvError> {
        let client = Client::open(redis_url)
            .map_err(|e| KvError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            KvError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisKeyValueStore initialized successfully");

        Ok(Self {
            conn_manager,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        })
    }
}

/// Whole seconds for `EX`; Redis rejects zero.
fn ttl_seconds(ttl: Duration) -> Result<u64, KvError> {
    match ttl.as_secs() {
        0 => Err(KvError::InvalidTtl(ttl)),
        secs => Ok(secs),
    }
}

fn unavailable(action: &str, e: &redis::RedisError) -> KvError {
    KvError::Unavailable(format!("Failed to {action}: {e}"))
}

impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn_manager.clone();
        conn.get(key).await.map_err(|e| unavailable("get key", &e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn_manager.clone();
        let seconds = ttl_seconds(ttl)?;

        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(|e| unavailable("set key", &e))?;

        tracing::debug!(key, ttl_seconds = seconds, "Stored key in Redis");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut conn = self.conn_manager.clone();
        let seconds = ttl_seconds(ttl)?;

        // Reply is "OK" when written, nil when the key exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("set key if absent", &e))?;

        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn_manager.clone();
        let deleted: usize = conn
            .del(key)
            .await
            .map_err(|e| unavailable("delete key", &e))?;
        Ok(deleted > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, KvError> {
        let mut conn = self.conn_manager.clone();
        let deleted: usize = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| unavailable("compare-and-delete key", &e))?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn_manager.clone();
        conn.exists(key)
            .await
            .map_err(|e| unavailable("check key existence", &e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_ttl_is_rejected() {
        assert_eq!(
            ttl_seconds(Duration::from_millis(500)),
            Err(KvError::InvalidTtl(Duration::from_millis(500)))
        );
        assert_eq!(ttl_seconds(Duration::from_secs(300)).unwrap(), 300);
    }

    #[test]
    fn redis_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedisKeyValueStore>();
    }
}
