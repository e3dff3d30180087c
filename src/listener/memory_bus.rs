use super::bus::{BusError, BusMessage, MessageBus, Subscription};
use crate::defaults;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

/// Process-local publish/subscribe bus.
///
/// Subjects match exactly; every live subscription to a subject receives a
/// copy of each message. Publishing to a subject nobody listens on succeeds
/// and drops the message. Subscriptions are removed once their receiver is
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    routes: Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `subject`.
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.routes
            .lock()
            .get(subject)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    /// Deliver a message, reply subject included, to every subscriber.
    pub async fn publish_message(&self, message: BusMessage) -> Result<(), BusError> {
        // Clone the senders so the lock is not held across an await.
        let senders = self
            .routes
            .lock()
            .get(&message.subject)
            .cloned()
            .unwrap_or_default();

        let mut closed = 0;
        for sender in &senders {
            if sender.send(message.clone()).await.is_err() {
                closed += 1;
            }
        }
        if closed > 0 {
            self.prune(&message.subject);
        }
        trace!(
            subject = %message.subject,
            delivered = senders.len() - closed,
            "Published message"
        );
        Ok(())
    }

    /// Publish on `subject` with a fresh reply inbox and wait for one reply.
    pub async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<BusMessage, BusError> {
        let inbox = format!("_INBOX.{}", Uuid::new_v4().simple());
        let mut replies = self.subscribe(&inbox).await?;

        self.publish_message(BusMessage::new(subject, payload).with_reply(inbox.as_str()))
            .await?;

        let outcome = tokio::time::timeout(timeout, replies.recv()).await;
        drop(replies);
        self.prune(&inbox);

        match outcome {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(BusError::Closed(inbox)),
            Err(_) => Err(BusError::Timeout(inbox)),
        }
    }

    fn prune(&self, subject: &str) {
        let mut routes = self.routes.lock();
        if let Some(senders) = routes.get_mut(subject) {
            senders.retain(|sender| !sender.is_closed());
            if senders.is_empty() {
                routes.remove(subject);
            }
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::channel(defaults::SUBSCRIPTION_CAPACITY);
        self.routes
            .lock()
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.publish_message(BusMessage::new(subject, payload)).await
    }

    fn name(&self) -> &'static str {
        "In-Memory Bus"
    }
}
