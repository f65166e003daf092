//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the workflow's degradation
//! points, which are exactly where a guarantee gets weaker without an error
//! reaching the caller:
//! - Reservation lock contention and store outages
//! - Availability cache hits, misses and corrupt snapshots
//! - Event publish/dispatch outcomes
//! - Live broadcast delivery
//!
//! # Example
//!
//! ```rust,no_run
//! use rentflow_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge};

/// Lock acquisitions that succeeded.
pub const LOCK_ACQUIRED: &str = "rentflow.lock.acquired";
/// Lock acquisitions refused because the vehicle was already locked.
pub const LOCK_CONTENDED: &str = "rentflow.lock.contended";
/// Lock operations that could not reach the store.
pub const LOCK_STORE_UNAVAILABLE: &str = "rentflow.lock.store_unavailable";
/// Availability snapshot served from cache.
pub const CACHE_HIT: &str = "rentflow.cache.hit";
/// Availability snapshot rebuilt from the durable store.
pub const CACHE_MISS: &str = "rentflow.cache.miss";
/// Cached snapshot that could not be decoded.
pub const CACHE_DECODE_FAILED: &str = "rentflow.cache.decode_failed";
/// Events handed to the bus.
pub const EVENTS_PUBLISHED: &str = "rentflow.events.published";
/// Events the bus rejected.
pub const EVENTS_PUBLISH_FAILED: &str = "rentflow.events.publish_failed";
/// Events routed to a named handler.
pub const EVENTS_DISPATCHED: &str = "rentflow.events.dispatched";
/// Events with an unknown discriminator.
pub const EVENTS_IGNORED: &str = "rentflow.events.ignored";
/// Events that failed to decode.
pub const EVENTS_MALFORMED: &str = "rentflow.events.malformed";
/// Events whose handler returned an error.
pub const EVENTS_HANDLER_FAILED: &str = "rentflow.events.handler_failed";
/// Frames queued to a live session.
pub const BROADCAST_SENT: &str = "rentflow.broadcast.sent";
/// Frames a live session refused.
pub const BROADCAST_FAILED: &str = "rentflow.broadcast.failed";
/// Registered live sessions.
pub const SESSIONS_LIVE: &str = "rentflow.sessions.live";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build or install the exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus recorder and its HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the exporter cannot be installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                register_metrics();
                tokio::spawn(async move {
                    if let Err(e) = exporter.await {
                        tracing::error!(error = ?e, "Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics server started");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(LOCK_ACQUIRED, "Reservation locks acquired");
    describe_counter!(LOCK_CONTENDED, "Reservation lock attempts refused (already held)");
    describe_counter!(
        LOCK_STORE_UNAVAILABLE,
        "Lock operations that proceeded without the lock store"
    );

    describe_counter!(CACHE_HIT, "Availability snapshots served from cache");
    describe_counter!(CACHE_MISS, "Availability snapshots rebuilt from the durable store");
    describe_counter!(CACHE_DECODE_FAILED, "Corrupt availability snapshots");

    describe_counter!(EVENTS_PUBLISHED, "Events published to the bus");
    describe_counter!(EVENTS_PUBLISH_FAILED, "Events the bus failed to accept");
    describe_counter!(EVENTS_DISPATCHED, "Events routed to a handler");
    describe_counter!(EVENTS_IGNORED, "Events with an unknown discriminator");
    describe_counter!(EVENTS_MALFORMED, "Events that failed to decode");
    describe_counter!(EVENTS_HANDLER_FAILED, "Events whose handler failed");

    describe_counter!(BROADCAST_SENT, "Live frames queued to sessions");
    describe_counter!(BROADCAST_FAILED, "Live frames sessions refused");
    describe_gauge!(SESSIONS_LIVE, "Currently registered live sessions");
}

/// Reservation lock metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record a successful acquisition.
    pub fn record_acquired() {
        counter!(LOCK_ACQUIRED).increment(1);
    }

    /// Record an acquisition refused because the lock was held.
    pub fn record_contended() {
        counter!(LOCK_CONTENDED).increment(1);
    }

    /// Record a lock operation that could not reach the store.
    pub fn record_store_unavailable() {
        counter!(LOCK_STORE_UNAVAILABLE).increment(1);
    }
}

/// Availability cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!(CACHE_HIT).increment(1);
    }

    /// Record a cache miss.
    pub fn record_miss() {
        counter!(CACHE_MISS).increment(1);
    }

    /// Record a snapshot that failed to decode.
    pub fn record_decode_failed() {
        counter!(CACHE_DECODE_FAILED).increment(1);
    }
}

/// Event bus metrics recorder.
pub struct EventMetrics;

impl EventMetrics {
    /// Record a published event.
    pub fn record_published(event: &'static str) {
        counter!(EVENTS_PUBLISHED, "event" => event).increment(1);
    }

    /// Record a publish failure.
    pub fn record_publish_failed(event: &'static str) {
        counter!(EVENTS_PUBLISH_FAILED, "event" => event).increment(1);
    }

    /// Record an event routed to its handler.
    pub fn record_dispatched(event: &'static str) {
        counter!(EVENTS_DISPATCHED, "event" => event).increment(1);
    }

    /// Record an event with an unknown discriminator.
    pub fn record_ignored() {
        counter!(EVENTS_IGNORED).increment(1);
    }

    /// Record an event that failed to decode.
    pub fn record_malformed() {
        counter!(EVENTS_MALFORMED).increment(1);
    }

    /// Record a handler failure.
    pub fn record_handler_failed(consumer: &str) {
        counter!(EVENTS_HANDLER_FAILED, "consumer" => consumer.to_string()).increment(1);
    }
}

/// Fanout metrics recorder.
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record frames delivered and refused by one broadcast.
    pub fn record_broadcast(sent: usize, failed: usize) {
        counter!(BROADCAST_SENT).increment(sent as u64);
        counter!(BROADCAST_FAILED).increment(failed as u64);
    }

    /// Record the current registry size.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_sessions(count: usize) {
        gauge!(SESSIONS_LIVE).set(count as f64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.render().is_none());
    }

    #[test]
    fn recorders_are_noops_without_an_installed_recorder() {
        LockMetrics::record_acquired();
        CacheMetrics::record_miss();
        EventMetrics::record_published("booking_created");
        BroadcastMetrics::record_broadcast(2, 1);
        BroadcastMetrics::record_sessions(3);
    }
}
