/*
 * memory.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, a multi-transport message exchange library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! In-process broker with queues, topics, temporary queues, priorities and expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::protocol::queue::broker::{
    Broker, BrokerError, BrokerSession, Destination, MessageConsumer, MessageProducer, MessageSelector,
    QueueMessage, SendOptions,
};

struct Stored {
    seq: u64,
    expires: Option<Instant>,
    message: QueueMessage,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<Stored>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn push(&mut self, seq: u64, expires: Option<Instant>, message: QueueMessage) {
        self.messages.push(Stored { seq, expires, message });
        self.notify.notify_waiters();
    }

    /// Highest priority first, then arrival order. Expired messages are dropped.
    fn take(&mut self, selector: Option<&MessageSelector>, now: Instant) -> Option<QueueMessage> {
        self.messages.retain(|m| m.expires.map_or(true, |at| at > now));
        let best = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| selector.map_or(true, |s| s.matches(&m.message)))
            .max_by(|(_, a), (_, b)| {
                a.message
                    .priority
                    .cmp(&b.message.priority)
                    .then(b.seq.cmp(&a.seq))
            })
            .map(|(i, _)| i)?;
        Some(self.messages.remove(best).message)
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    /// Topic name to subscriber queue names.
    topics: HashMap<String, Vec<String>>,
}

struct Inner {
    state: Mutex<BrokerState>,
    next_id: AtomicU64,
}

/// Broker living in this process. Clones share the same queues.
///
/// Named queues are created on first use; topics deliver to the consumers
/// subscribed at publish time and drop messages nobody is subscribed to.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>, BrokerError> {
        self.inner
            .state
            .lock()
            .map_err(|_| BrokerError::Other("broker state poisoned".into()))
    }

    fn next(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether a queue or temporary queue with this name currently exists.
    pub fn queue_exists(&self, name: &str) -> bool {
        self.lock().map(|s| s.queues.contains_key(name)).unwrap_or(false)
    }

    /// Messages waiting on a queue (including not-yet-purged expired ones).
    pub fn queue_depth(&self, name: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|s| s.queues.get(name).map(|q| q.messages.len()))
            .unwrap_or(0)
    }

    fn publish(&self, destination: &Destination, mut message: QueueMessage, options: &SendOptions) -> Result<String, BrokerError> {
        let id = format!("ID:{}", self.next());
        message.message_id = Some(id.clone());
        message.destination = Some(destination.clone());
        message.delivery_mode = options.delivery_mode;
        message.priority = options.priority.min(9);
        let expires = options.time_to_live.map(|ttl| Instant::now() + ttl);
        let seq = self.next();
        let mut state = self.lock()?;
        match destination {
            Destination::Queue(name) | Destination::Temporary(name) => {
                let queue = state
                    .queues
                    .get_mut(name)
                    .ok_or_else(|| BrokerError::DestinationNotFound(destination.to_string()))?;
                queue.push(seq, expires, message);
            }
            Destination::Topic(name) => {
                let subscribers = state.topics.get(name).cloned().unwrap_or_default();
                if subscribers.is_empty() {
                    trace!(topic = %name, "no subscribers; message dropped");
                }
                for sub in subscribers {
                    if let Some(queue) = state.queues.get_mut(&sub) {
                        queue.push(seq, expires, message.clone());
                    }
                }
            }
        }
        trace!(destination = %destination, id = %id, "message sent");
        Ok(id)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn create_session(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        Ok(Box::new(MemorySession {
            broker: self.clone(),
            temporary: Vec::new(),
            closed: false,
        }))
    }
}

struct MemorySession {
    broker: MemoryBroker,
    temporary: Vec<String>,
    closed: bool,
}

impl MemorySession {
    fn check_open(&self) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed("session"));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerSession for MemorySession {
    async fn resolve(&mut self, name: &str, pub_sub: bool) -> Result<Destination, BrokerError> {
        self.check_open()?;
        if pub_sub {
            self.broker.lock()?.topics.entry(name.to_string()).or_default();
            return Ok(Destination::Topic(name.to_string()));
        }
        self.broker.lock()?.queues.entry(name.to_string()).or_default();
        Ok(Destination::Queue(name.to_string()))
    }

    async fn create_temporary_queue(&mut self) -> Result<Destination, BrokerError> {
        self.check_open()?;
        let name = format!("TEMP.{}", self.broker.next());
        self.broker.lock()?.queues.insert(name.clone(), QueueState::default());
        self.temporary.push(name.clone());
        debug!(queue = %name, "temporary queue created");
        Ok(Destination::Temporary(name))
    }

    async fn delete_temporary_queue(&mut self, destination: &Destination) -> Result<(), BrokerError> {
        let Destination::Temporary(name) = destination else {
            return Err(BrokerError::Other(format!("{} is not a temporary queue", destination)));
        };
        if let Some(queue) = self.broker.lock()?.queues.remove(name) {
            queue.notify.notify_waiters();
        }
        self.temporary.retain(|n| n != name);
        debug!(queue = %name, "temporary queue deleted");
        Ok(())
    }

    async fn create_producer(&mut self, destination: &Destination) -> Result<Box<dyn MessageProducer>, BrokerError> {
        self.check_open()?;
        Ok(Box::new(MemoryProducer {
            broker: self.broker.clone(),
            destination: destination.clone(),
            closed: false,
        }))
    }

    async fn create_consumer(
        &mut self,
        destination: &Destination,
        selector: Option<MessageSelector>,
    ) -> Result<Box<dyn MessageConsumer>, BrokerError> {
        self.check_open()?;
        let (queue, subscription) = match destination {
            Destination::Queue(name) | Destination::Temporary(name) => {
                if !self.broker.lock()?.queues.contains_key(name) {
                    return Err(BrokerError::DestinationNotFound(destination.to_string()));
                }
                (name.clone(), None)
            }
            Destination::Topic(topic) => {
                let sub = format!("SUB.{}.{}", topic, self.broker.next());
                let mut state = self.broker.lock()?;
                state.queues.insert(sub.clone(), QueueState::default());
                state.topics.entry(topic.clone()).or_default().push(sub.clone());
                (sub, Some(topic.clone()))
            }
        };
        Ok(Box::new(MemoryConsumer {
            broker: self.broker.clone(),
            queue,
            subscription,
            selector,
            closed: false,
        }))
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for name in std::mem::take(&mut self.temporary) {
            self.delete_temporary_queue(&Destination::Temporary(name)).await?;
        }
        Ok(())
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
    destination: Destination,
    closed: bool,
}

#[async_trait]
impl MessageProducer for MemoryProducer {
    async fn send(&mut self, message: QueueMessage, options: &SendOptions) -> Result<String, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed("producer"));
        }
        self.broker.publish(&self.destination, message, options)
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryConsumer {
    broker: MemoryBroker,
    queue: String,
    /// Topic this consumer's private queue is subscribed to.
    subscription: Option<String>,
    selector: Option<MessageSelector>,
    closed: bool,
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<QueueMessage>, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed("consumer"));
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let notify = {
                let mut state = self.broker.lock()?;
                let queue = state
                    .queues
                    .get_mut(&self.queue)
                    .ok_or_else(|| BrokerError::DestinationNotFound(self.queue.clone()))?;
                if let Some(message) = queue.take(self.selector.as_ref(), Instant::now()) {
                    return Ok(Some(message));
                }
                queue.notify.clone()
            };
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // A send may have landed between dropping the lock and enabling.
            {
                let mut state = self.broker.lock()?;
                if let Some(queue) = state.queues.get_mut(&self.queue) {
                    if let Some(message) = queue.take(self.selector.as_ref(), Instant::now()) {
                        return Ok(Some(message));
                    }
                }
            }
            match deadline {
                Some(at) if at <= Instant::now() => return Ok(None),
                Some(at) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(topic) = self.subscription.take() {
            let mut state = self.broker.lock()?;
            state.queues.remove(&self.queue);
            if let Some(subs) = state.topics.get_mut(&topic) {
                subs.retain(|s| *s != self.queue);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::queue::broker::{PropertyValue, QueueBody};
    use crate::uri::DeliveryMode;

    fn text(s: &str) -> QueueMessage {
        QueueMessage::new(QueueBody::Text(s.to_string()))
    }

    #[tokio::test]
    async fn higher_priority_is_delivered_first() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let q = session.resolve("Orders", false).await.unwrap();
        let mut producer = session.create_producer(&q).await.unwrap();
        let low = SendOptions { priority: 1, ..SendOptions::default() };
        let high = SendOptions { priority: 8, ..SendOptions::default() };
        producer.send(text("a"), &low).await.unwrap();
        producer.send(text("b"), &high).await.unwrap();
        producer.send(text("c"), &low).await.unwrap();
        let mut consumer = session.create_consumer(&q, None).await.unwrap();
        let mut order = Vec::new();
        while let Some(m) = consumer.receive(Some(Duration::ZERO)).await.unwrap() {
            if let QueueBody::Text(t) = m.body {
                order.push(t);
            }
        }
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn selector_skips_other_correlations() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let q = session.resolve("Replies", false).await.unwrap();
        let mut producer = session.create_producer(&q).await.unwrap();
        let mut other = text("other");
        other.correlation_id = Some("ID:1".into());
        let mut mine = text("mine");
        mine.correlation_id = Some("ID:2".into());
        mine.set_property("k", PropertyValue::Bool(true));
        producer.send(other, &SendOptions::default()).await.unwrap();
        producer.send(mine, &SendOptions::default()).await.unwrap();
        let mut consumer = session
            .create_consumer(&q, Some(MessageSelector::CorrelationId("ID:2".into())))
            .await
            .unwrap();
        let got = consumer.receive(Some(Duration::ZERO)).await.unwrap().unwrap();
        assert_eq!(got.body, QueueBody::Text("mine".into()));
        assert_eq!(got.property("k"), Some(&PropertyValue::Bool(true)));
        assert_eq!(broker.queue_depth("Replies"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_messages_are_not_delivered() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let q = session.resolve("Short", false).await.unwrap();
        let mut producer = session.create_producer(&q).await.unwrap();
        let opts = SendOptions {
            time_to_live: Some(Duration::from_secs(1)),
            delivery_mode: DeliveryMode::NonPersistent,
            ..SendOptions::default()
        };
        producer.send(text("stale"), &opts).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let mut consumer = session.create_consumer(&q, None).await.unwrap();
        assert!(consumer.receive(Some(Duration::ZERO)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn receive_wakes_on_send() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let q = session.resolve("Wake", false).await.unwrap();
        let mut consumer = session.create_consumer(&q, None).await.unwrap();
        let b = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut s = b.create_session().await.unwrap();
            let q = s.resolve("Wake", false).await.unwrap();
            let mut p = s.create_producer(&q).await.unwrap();
            p.send(text("hi"), &SendOptions::default()).await.unwrap();
        });
        let got = consumer.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert!(got.is_some());
        assert!(consumer.receive(Some(Duration::from_millis(10))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_close_deletes_temporary_queues() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let temp = session.create_temporary_queue().await.unwrap();
        assert!(temp.is_temporary());
        assert!(broker.queue_exists(temp.name()));
        session.close().await.unwrap();
        assert!(!broker.queue_exists(temp.name()));
    }

    #[tokio::test]
    async fn topic_delivers_to_each_subscriber() {
        let broker = MemoryBroker::new();
        let mut session = broker.create_session().await.unwrap();
        let t = session.resolve("News", true).await.unwrap();
        let mut a = session.create_consumer(&t, None).await.unwrap();
        let mut b = session.create_consumer(&t, None).await.unwrap();
        let mut producer = session.create_producer(&t).await.unwrap();
        producer.send(text("x"), &SendOptions::default()).await.unwrap();
        assert!(a.receive(Some(Duration::ZERO)).await.unwrap().is_some());
        assert!(b.receive(Some(Duration::ZERO)).await.unwrap().is_some());
    }
}
