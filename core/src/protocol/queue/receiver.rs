/*
 * receiver.rs
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

//! Queue receiver: one inbound broker message per connection, reply sent
//! to the message's reply-to destination.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::protocol::queue::broker::{
    Broker, BrokerSession, Destination, MessageConsumer, PropertyValue, QueueBody, QueueMessage, SendOptions,
};
use crate::protocol::queue::properties::{apply_headers, FAULT_PROPERTY};
use crate::protocol::queue::to_wire;
use crate::server::{dispatch, MessageHandler, ReceiverHandle};
use crate::transport::{
    InboundConnection, ReceiverBinding, ReceiverConnection, TransportError, TransportKind, WireMessage,
};

pub type QueueReceiverConnection = ReceiverConnection<QueueReceiverBinding>;

/// Receiver-side queue binding around one inbound message.
pub struct QueueReceiverBinding {
    broker: Arc<dyn Broker>,
    original: QueueMessage,
    request: WireMessage,
    reply: Option<QueueMessage>,
}

impl QueueReceiverBinding {
    /// Fails with `UnsupportedPayload` for body kinds the binding cannot carry.
    pub fn new(broker: Arc<dyn Broker>, original: QueueMessage) -> Result<Self, TransportError> {
        let request = to_wire(&original)?;
        Ok(Self {
            broker,
            original,
            request,
            reply: None,
        })
    }

    pub fn request_message(&self) -> &QueueMessage {
        &self.original
    }

    pub fn reply_message(&self) -> Option<&QueueMessage> {
        self.reply.as_ref()
    }
}

#[async_trait]
impl ReceiverBinding for QueueReceiverBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Queue
    }

    fn request(&self) -> &WireMessage {
        &self.request
    }

    async fn prepare_reply(&mut self, reply: WireMessage) -> Result<(), TransportError> {
        if self.original.reply_to.is_none() {
            warn!(message_id = ?self.original.message_id, "request has no reply-to destination; not replying");
            return Ok(());
        }
        let body = match &self.original.body {
            QueueBody::Text(_) => QueueBody::Text(String::from_utf8_lossy(&reply.body).into_owned()),
            _ => QueueBody::Bytes(reply.body),
        };
        let mut message = QueueMessage::new(body);
        message.correlation_id = self
            .original
            .correlation_id
            .clone()
            .or_else(|| self.original.message_id.clone());
        apply_headers(&mut message, &reply.headers);
        if reply.fault {
            message.set_property(FAULT_PROPERTY, PropertyValue::Bool(true));
        }
        self.reply = Some(message);
        Ok(())
    }

    async fn flush_reply(&mut self) -> Result<bool, TransportError> {
        let (Some(reply), Some(reply_to)) = (self.reply.take(), self.original.reply_to.clone()) else {
            return Ok(false);
        };
        let options = SendOptions {
            delivery_mode: self.original.delivery_mode,
            priority: self.original.priority,
            time_to_live: None,
        };
        let mut session = self.broker.create_session().await?;
        let sent = send_once(session.as_mut(), &reply_to, reply.clone(), &options).await;
        let closed = session.close().await;
        let id = sent?;
        closed?;
        debug!(reply_to = %reply_to, message_id = %id, correlation_id = ?reply.correlation_id, "reply published");
        self.reply = Some(reply);
        Ok(true)
    }

    async fn release(&mut self, _replied: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Producers are not pooled: open, send one message, close.
async fn send_once(
    session: &mut dyn BrokerSession,
    destination: &Destination,
    message: QueueMessage,
    options: &SendOptions,
) -> Result<String, TransportError> {
    let mut producer = session.create_producer(destination).await?;
    let sent = producer.send(message, options).await;
    let closed = producer.close().await;
    let id = sent?;
    closed?;
    Ok(id)
}

/// Run one inbound message through `handler`.
pub async fn handle_message(
    broker: Arc<dyn Broker>,
    message: QueueMessage,
    handler: &dyn MessageHandler,
) -> Result<(), TransportError> {
    let binding = QueueReceiverBinding::new(broker, message)?;
    let mut connection = InboundConnection::Queue(ReceiverConnection::new(binding));
    dispatch(handler, &mut connection).await
}

/// Listens on a queue or topic and handles each message as it arrives.
pub struct QueueMessageReceiver {
    broker: Arc<dyn Broker>,
    destination: String,
    pub_sub: bool,
}

impl QueueMessageReceiver {
    pub fn new(broker: Arc<dyn Broker>, destination: impl Into<String>) -> Self {
        Self {
            broker,
            destination: destination.into(),
            pub_sub: false,
        }
    }

    /// Subscribe to a topic instead of consuming from a queue.
    pub fn with_pub_sub(mut self, pub_sub: bool) -> Self {
        self.pub_sub = pub_sub;
        self
    }

    /// Open the consumer and start listening. Errors opening it are returned here.
    pub async fn start(self, handler: Arc<dyn MessageHandler>) -> Result<ReceiverHandle, TransportError> {
        let mut session = self.broker.create_session().await?;
        let destination = session.resolve(&self.destination, self.pub_sub).await?;
        let consumer = session.create_consumer(&destination, None).await?;
        info!(destination = %destination, "starting queue receiver");
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(listen(self.broker, session, consumer, destination.clone(), handler, stop_rx));
        Ok(ReceiverHandle::new(destination.to_string(), stop_tx, task))
    }
}

async fn listen(
    broker: Arc<dyn Broker>,
    mut session: Box<dyn BrokerSession>,
    mut consumer: Box<dyn MessageConsumer>,
    destination: Destination,
    handler: Arc<dyn MessageHandler>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        let received = tokio::select! {
            _ = stop.changed() => break,
            r = consumer.receive(None) => r,
        };
        match received {
            Ok(Some(message)) => {
                let id = message.message_id.clone();
                match handle_message(Arc::clone(&broker), message, handler.as_ref()).await {
                    Ok(()) => {}
                    Err(TransportError::UnsupportedPayload(reason)) => {
                        warn!(destination = %destination, message_id = ?id, %reason, "rejected inbound message");
                    }
                    Err(e) => error!(destination = %destination, message_id = ?id, error = %e, "could not handle inbound message"),
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(destination = %destination, error = %e, "consumer failed; queue receiver stops");
                break;
            }
        }
    }
    info!(destination = %destination, "stopping queue receiver");
    if let Err(e) = consumer.close().await {
        warn!(error = %e, "failed to close consumer");
    }
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close session");
    }
}
