//! Generic event bus consumer with automatic reconnection.
//!
//! `EventConsumer` owns the subscribe-process-reconnect loop for one
//! consumer group. Each delivered message goes to a [`MessageHandler`];
//! handler failures are logged and the message is dropped, so a poison
//! message never blocks the group. There is no retry and no dead-letter
//! queue.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe(topics, group)
//!         loop {
//!             - Handle message
//!             - Log errors (don't crash)
//!             - Check shutdown signal
//!         }
//!     if stream ended or subscribe failed:
//!         wait retry_delay (or shutdown)
//! }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let consumer = EventConsumer::builder()
//!     .name("notification")
//!     .topics(vec!["booking-events".to_string(), "payment-events".to_string()])
//!     .group("notification-service")
//!     .event_bus(event_bus)
//!     .handler(router)
//!     .shutdown(shutdown_rx)
//!     .build()?;
//!
//! let handle = consumer.spawn();
//! ```

use crate::metrics::EventMetrics;
use async_trait::async_trait;
use futures::StreamExt;
use rentflow_core::event_bus::{BusMessage, EventBus, MessageStream};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default wait before resubscribing after a failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Failure while handling one message.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Processing failed
    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Processes raw messages delivered to a consumer.
///
/// Errors are logged by the [`EventConsumer`] and never reach the bus.
/// Implementations must be idempotent: delivery is at-least-once.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one delivered message.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if processing failed. The message is dropped.
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

/// Missing required builder field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("EventConsumer is missing required field '{0}'")]
pub struct ConsumerBuildError(&'static str);

/// Generic event bus consumer.
///
/// # Configuration
///
/// - `name`: Human-readable consumer name (for logging)
/// - `topics`: Topics to subscribe to
/// - `group`: Consumer group; each group receives every message
/// - `event_bus`: Event bus instance to consume from
/// - `handler`: Handler that processes each message
/// - `shutdown`: Broadcast receiver for graceful shutdown coordination
/// - `retry_delay`: How long to wait before resubscribing (default: 5s)
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    group: String,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn MessageHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

/// Why message processing stopped.
enum StreamExit {
    Shutdown,
    Ended,
}

impl EventConsumer {
    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Consumer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the consumer as a background task.
    ///
    /// The task runs until a shutdown signal is received.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, group = %self.group, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribe_result = tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                result = self.event_bus.subscribe(&topics, &self.group) => result,
            };

            match subscribe_result {
                Ok(mut stream) => {
                    info!(
                        consumer = %self.name,
                        group = %self.group,
                        topics = ?self.topics,
                        "Subscribed to event bus"
                    );

                    if let StreamExit::Shutdown = self.process_stream(&mut stream).await {
                        break;
                    }
                    warn!(consumer = %self.name, retry_in = ?self.retry_delay, "Event stream ended, reconnecting");
                }
                Err(e) => {
                    error!(
                        consumer = %self.name,
                        error = %e,
                        retry_in = ?self.retry_delay,
                        "Failed to subscribe to event bus"
                    );
                }
            }

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal while waiting to reconnect");
                    break;
                }
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    async fn process_stream(&mut self, stream: &mut MessageStream) -> StreamExit {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return StreamExit::Shutdown;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(message)) => {
                            if let Err(e) = self.handler.handle(&message).await {
                                EventMetrics::record_handler_failed(&self.name);
                                error!(
                                    consumer = %self.name,
                                    topic = %message.topic,
                                    payload = %message.payload_text(),
                                    error = %e,
                                    "Failed to handle message, dropping it"
                                );
                            }
                        }
                        Some(Err(e)) => {
                            error!(consumer = %self.name, error = %e, "Error receiving message from stream");
                        }
                        None => {
                            warn!(consumer = %self.name, "Event stream ended");
                            return StreamExit::Ended;
                        }
                    }
                }
            }
        }
    }
}

/// Builder for configuring an `EventConsumer`.
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    group: Option<String>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn MessageHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl EventConsumerBuilder {
    /// Set consumer name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set the consumer group.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set message handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set custom retry delay (default: 5 seconds).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the `EventConsumer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerBuildError`] naming the first required field that
    /// was not set.
    pub fn build(self) -> Result<EventConsumer, ConsumerBuildError> {
        Ok(EventConsumer {
            name: self.name.ok_or(ConsumerBuildError("name"))?,
            topics: self.topics.ok_or(ConsumerBuildError("topics"))?,
            group: self.group.ok_or(ConsumerBuildError("group"))?,
            event_bus: self.event_bus.ok_or(ConsumerBuildError("event_bus"))?,
            handler: self.handler.ok_or(ConsumerBuildError("handler"))?,
            shutdown: self.shutdown.ok_or(ConsumerBuildError("shutdown"))?,
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rentflow_core::event::BOOKING_EVENTS;
    use rentflow_testing::InMemoryEventBus;
    use std::sync::Mutex;

    /// Records payloads; fails on payloads equal to `b"poison"`.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(message.payload.clone());
            if message.payload == b"poison" {
                return Err(HandlerError::Failed("poison".to_string()));
            }
            Ok(())
        }
    }

    async fn wait_for(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.seen.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn build_reports_missing_field() {
        let err = EventConsumer::builder().name("x").build().err().unwrap();
        assert_eq!(err, ConsumerBuildError("topics"));
    }

    #[tokio::test]
    async fn handler_failure_does_not_stop_consumer() {
        let bus = Arc::new(InMemoryEventBus::new());
        let recorder = Arc::new(Recorder::default());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = EventConsumer::builder()
            .name("test")
            .topics(vec![BOOKING_EVENTS.to_string()])
            .group("test-group")
            .event_bus(bus.clone())
            .handler(recorder.clone())
            .shutdown(shutdown_rx)
            .build()
            .unwrap()
            .spawn();

        bus.wait_for_subscribers(BOOKING_EVENTS, 1).await;
        bus.publish(&BusMessage::new(BOOKING_EVENTS, b"poison".to_vec()))
            .await
            .unwrap();
        bus.publish(&BusMessage::new(BOOKING_EVENTS, b"after".to_vec()))
            .await
            .unwrap();

        wait_for(&recorder, 2).await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![b"poison".to_vec(), b"after".to_vec()]
        );

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn each_group_receives_every_message() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        for (group, recorder) in [("availability", &first), ("notification", &second)] {
            let handler: Arc<dyn MessageHandler> = recorder.clone();
            let _ = EventConsumer::builder()
                .name(group)
                .topics(vec![BOOKING_EVENTS.to_string()])
                .group(group)
                .event_bus(bus.clone())
                .handler(handler)
                .shutdown(shutdown_tx.subscribe())
                .build()
                .unwrap()
                .spawn();
        }

        bus.wait_for_subscribers(BOOKING_EVENTS, 2).await;
        bus.publish(&BusMessage::new(BOOKING_EVENTS, b"m".to_vec()))
            .await
            .unwrap();

        wait_for(&first, 1).await;
        wait_for(&second, 1).await;
        assert_eq!(first.seen.lock().unwrap().len(), 1);
        assert_eq!(second.seen.lock().unwrap().len(), 1);
        let _ = shutdown_tx.send(());
    }
}
