/*
 * sender.rs
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

//! Queue sender: publish the request, then receive on the reply destination
//! until a message correlated to the request's message id arrives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::QueueSettings;
use crate::protocol::queue::broker::{
    Broker, BrokerSession, Destination, MessageSelector, PropertyValue, QueueBody, QueueMessage, SendOptions,
};
use crate::protocol::queue::properties::{
    apply_headers, BINDING_VERSION, BINDING_VERSION_PROPERTY, REQUEST_URI_PROPERTY,
};
use crate::protocol::queue::to_wire;
use crate::transport::{SenderBinding, SenderConnection, TransportError, TransportHeaders, TransportKind, WireMessage};
use crate::uri::{MessageType, QueueUri, QUEUE_SCHEMES};

pub type QueueSenderConnection = SenderConnection<QueueSenderBinding>;

/// Sender-side queue binding. Owns one broker session for its lifetime.
pub struct QueueSenderBinding {
    uri: QueueUri,
    session: Box<dyn BrokerSession>,
    destination: Destination,
    receive_timeout: Option<Duration>,
    message_type: MessageType,
    request: Option<QueueMessage>,
    request_id: Option<String>,
    reply_to: Option<Destination>,
}

impl QueueSenderBinding {
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Broker-assigned id of the published request.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Where the reply is expected. Set once the request is prepared.
    pub fn reply_destination(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    /// Session owned by this exchange, for binding-only operations.
    pub fn session_mut(&mut self) -> &mut dyn BrokerSession {
        self.session.as_mut()
    }

    fn send_options(&self) -> SendOptions {
        let defaults = SendOptions::default();
        SendOptions {
            delivery_mode: self.uri.delivery_mode().unwrap_or(defaults.delivery_mode),
            priority: self.uri.priority().unwrap_or(defaults.priority),
            time_to_live: self.uri.time_to_live().or(defaults.time_to_live),
        }
    }
}

#[async_trait]
impl SenderBinding for QueueSenderBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Queue
    }

    fn uri(&self) -> String {
        self.uri.to_string()
    }

    async fn prepare_request(&mut self, headers: &TransportHeaders, body: Bytes) -> Result<(), TransportError> {
        let body = match self.message_type {
            MessageType::Bytes => QueueBody::Bytes(body),
            MessageType::Text => QueueBody::Text(
                String::from_utf8(body.to_vec())
                    .map_err(|_| TransportError::UnsupportedPayload("text message payload is not UTF-8".into()))?,
            ),
        };
        let mut message = QueueMessage::new(body);
        apply_headers(&mut message, headers);
        message.set_property(REQUEST_URI_PROPERTY, PropertyValue::String(self.uri.to_string()));
        message.set_property(BINDING_VERSION_PROPERTY, PropertyValue::String(BINDING_VERSION.into()));
        let reply_to = match self.uri.reply_to_name() {
            Some(name) => self.session.resolve(name, false).await?,
            None => self.session.create_temporary_queue().await?,
        };
        message.reply_to = Some(reply_to.clone());
        self.reply_to = Some(reply_to);
        self.request = Some(message);
        Ok(())
    }

    async fn publish(&mut self) -> Result<(), TransportError> {
        let request = self
            .request
            .take()
            .ok_or_else(|| TransportError::IllegalState("no request prepared".to_string()))?;
        let options = self.send_options();
        let mut producer = self.session.create_producer(&self.destination).await?;
        let sent = producer.send(request, &options).await;
        let closed = producer.close().await;
        let id = sent?;
        closed?;
        debug!(destination = %self.destination, message_id = %id, "request published");
        self.request_id = Some(id);
        Ok(())
    }

    async fn await_reply(&mut self) -> Result<Option<WireMessage>, TransportError> {
        let (Some(reply_to), Some(id)) = (self.reply_to.clone(), self.request_id.clone()) else {
            return Err(TransportError::IllegalState("request was not published".to_string()));
        };
        // a temporary queue belongs to this exchange alone
        let selector = (!reply_to.is_temporary()).then(|| MessageSelector::CorrelationId(id.clone()));
        let mut consumer = self.session.create_consumer(&reply_to, selector).await?;
        let received = consumer.receive(self.receive_timeout).await;
        let reply = match received {
            Ok(Some(reply)) => {
                if let Ok(Some(duplicate)) = consumer.receive(Some(Duration::ZERO)).await {
                    warn!(
                        message_id = %id,
                        duplicate = ?duplicate.message_id,
                        "received more than one response for request; using the first"
                    );
                }
                Some(reply)
            }
            Ok(None) => None,
            Err(e) => {
                let _ = consumer.close().await;
                return Err(e.into());
            }
        };
        consumer.close().await?;
        match reply {
            Some(reply) => to_wire(&reply).map(Some),
            None => {
                debug!(reply_to = %reply_to, message_id = %id, "no response before timeout");
                Ok(None)
            }
        }
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        if let Some(reply_to) = self.reply_to.take().filter(Destination::is_temporary) {
            self.session.delete_temporary_queue(&reply_to).await?;
        }
        self.session.close().await?;
        Ok(())
    }
}

/// Opens queue exchanges for `jms:` and `queue:` URIs.
#[derive(Clone)]
pub struct QueueMessageSender {
    broker: Arc<dyn Broker>,
    settings: QueueSettings,
}

impl QueueMessageSender {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            settings: QueueSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    /// `None` waits forever.
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.receive_timeout = timeout;
        self
    }

    pub fn supports(&self, uri: &str) -> bool {
        uri.split_once(':')
            .is_some_and(|(scheme, _)| QUEUE_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)))
    }

    /// Parse the destination, open a session and resolve the destination.
    pub async fn open(&self, uri: &str) -> Result<QueueSenderConnection, TransportError> {
        let uri = QueueUri::parse(uri)?;
        let mut session = self.broker.create_session().await?;
        let destination = match session.resolve(uri.destination(), uri.is_pub_sub()).await {
            Ok(d) => d,
            Err(e) => {
                let _ = session.close().await;
                return Err(e.into());
            }
        };
        let message_type = uri.message_type().unwrap_or(self.settings.message_type);
        Ok(SenderConnection::new(QueueSenderBinding {
            uri,
            session,
            destination,
            receive_timeout: self.settings.receive_timeout,
            message_type,
            request: None,
            request_id: None,
            reply_to: None,
        }))
    }
}
