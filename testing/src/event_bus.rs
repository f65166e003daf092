//! In-memory event bus with consumer groups.

use futures::Stream;
use rentflow_core::event_bus::{BusMessage, EventBus, EventBusError, MessageStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct Group {
    members: Vec<mpsc::UnboundedSender<BusMessage>>,
    next: usize,
}

#[derive(Default)]
struct Inner {
    /// topic -> group -> members
    topics: HashMap<String, HashMap<String, Group>>,
    published: Vec<BusMessage>,
}

/// In-memory [`EventBus`].
///
/// Every group subscribed to a topic receives each message once; members
/// of one group take turns (round-robin). Messages published before any
/// subscription are recorded in the log but delivered to nobody, like a
/// consumer group starting at the latest offset.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<Inner>>,
    fail_publish: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `publish` fail (broker outage).
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Every successfully published message, in order.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.inner.lock().unwrap().published.clone()
    }

    /// Published payloads on `topic`, parsed as JSON.
    #[must_use]
    pub fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .filter_map(|message| serde_json::from_slice(&message.payload).ok())
            .collect()
    }

    /// Live subscriptions on `topic` across all groups.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .topics
            .get(topic)
            .map_or(0, |groups| {
                groups
                    .values()
                    .flat_map(|group| group.members.iter())
                    .filter(|sender| !sender.is_closed())
                    .count()
            })
    }

    /// Wait (up to one second) until `topic` has at least `count` subscriptions.
    pub async fn wait_for_subscribers(&self, topic: &str, count: usize) {
        for _ in 0..200 {
            if self.subscriber_count(topic) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn deliver(&self, message: &BusMessage) {
        let mut inner = self.inner.lock().unwrap();
        inner.published.push(message.clone());

        let Some(groups) = inner.topics.get_mut(&message.topic) else {
            return;
        };
        for group in groups.values_mut() {
            group.members.retain(|sender| !sender.is_closed());
            if group.members.is_empty() {
                continue;
            }
            let index = group.next % group.members.len();
            group.next = group.next.wrapping_add(1);
            let _ = group.members[index].send(message.clone());
        }
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn register(&self, topics: &[&str], group: &str) -> mpsc::UnboundedReceiver<BusMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        for topic in topics {
            inner
                .topics
                .entry((*topic).to_string())
                .or_default()
                .entry(group.to_string())
                .or_default()
                .members
                .push(tx.clone());
        }
        rx
    }
}

fn receiver_stream(
    mut rx: mpsc::UnboundedReceiver<BusMessage>,
) -> impl Stream<Item = Result<BusMessage, EventBusError>> + Send {
    async_stream::stream! {
        while let Some(message) = rx.recv().await {
            yield Ok(message);
        }
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let message = message.clone();
        Box::pin(async move {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic: message.topic,
                    reason: "simulated broker outage".to_string(),
                });
            }
            self.deliver(&message);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
        group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>> {
        let rx = self.register(topics, group);
        Box::pin(async move {
            let stream: MessageStream = Box::pin(receiver_stream(rx));
            Ok(stream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn groups_fan_out_and_members_share() {
        let bus = InMemoryEventBus::new();
        let mut a1 = bus.subscribe(&["t"], "a").await.unwrap();
        let mut a2 = bus.subscribe(&["t"], "a").await.unwrap();
        let mut b = bus.subscribe(&["t"], "b").await.unwrap();

        bus.publish(&BusMessage::new("t", b"1".to_vec())).await.unwrap();
        bus.publish(&BusMessage::new("t", b"2".to_vec())).await.unwrap();

        assert_eq!(a1.next().await.unwrap().unwrap().payload, b"1");
        assert_eq!(a2.next().await.unwrap().unwrap().payload, b"2");
        assert_eq!(b.next().await.unwrap().unwrap().payload, b"1");
        assert_eq!(b.next().await.unwrap().unwrap().payload, b"2");
    }

    #[tokio::test]
    async fn publish_failure_is_reported_and_not_logged() {
        let bus = InMemoryEventBus::new();
        bus.set_publish_failure(true);
        assert!(bus.publish(&BusMessage::new("t", b"x".to_vec())).await.is_err());
        assert!(bus.published().is_empty());
    }
}
