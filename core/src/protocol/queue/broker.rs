/*
 * broker.rs
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

//! Message broker abstraction: sessions, destinations, producers, consumers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::transport::TransportError;
use crate::uri::DeliveryMode;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("destination {0} does not exist")]
    DestinationNotFound(String),
    #[error("{0} is closed")]
    Closed(&'static str),
    #[error("broker error: {0}")]
    Other(String),
}

impl From<BrokerError> for TransportError {
    fn from(e: BrokerError) -> Self {
        TransportError::io("broker", e)
    }
}

/// Where a message is sent or consumed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Queue(String),
    Topic(String),
    /// Queue created for one exchange; deleted by whoever created it.
    Temporary(String),
}

impl Destination {
    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(n) | Destination::Topic(n) | Destination::Temporary(n) => n,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Destination::Temporary(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Queue(n) => write!(f, "queue://{}", n),
            Destination::Topic(n) => write!(f, "topic://{}", n),
            Destination::Temporary(n) => write!(f, "temp-queue://{}", n),
        }
    }
}

/// Typed message property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) => s.trim().parse().ok(),
            PropertyValue::Int(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Message body kinds a broker can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBody {
    Bytes(Bytes),
    Text(String),
    Map(Vec<(String, String)>),
}

/// A broker message. Ids, destination and expiry are set by the broker on send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<Destination>,
    pub destination: Option<Destination>,
    pub delivery_mode: DeliveryMode,
    pub priority: u8,
    pub properties: Vec<(String, PropertyValue)>,
    pub body: QueueBody,
}

impl QueueMessage {
    pub fn new(body: QueueBody) -> Self {
        Self {
            message_id: None,
            correlation_id: None,
            reply_to: None,
            destination: None,
            delivery_mode: DeliveryMode::Persistent,
            priority: DEFAULT_PRIORITY,
            properties: Vec::new(),
            body,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Replace or add a property.
    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        self.properties.retain(|(k, _)| *k != name);
        self.properties.push((name, value));
    }
}

pub const DEFAULT_PRIORITY: u8 = 4;

/// Per-send quality of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub delivery_mode: DeliveryMode,
    pub priority: u8,
    /// `None` never expires.
    pub time_to_live: Option<Duration>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Persistent,
            priority: DEFAULT_PRIORITY,
            time_to_live: None,
        }
    }
}

/// Consumer-side filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSelector {
    CorrelationId(String),
}

impl MessageSelector {
    pub fn matches(&self, message: &QueueMessage) -> bool {
        match self {
            MessageSelector::CorrelationId(id) => message.correlation_id.as_deref() == Some(id.as_str()),
        }
    }
}

/// Connection factory equivalent.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn create_session(&self) -> Result<Box<dyn BrokerSession>, BrokerError>;
}

/// Single-owner session.
#[async_trait]
pub trait BrokerSession: Send {
    /// Look up (or create) a named queue or topic.
    async fn resolve(&mut self, name: &str, pub_sub: bool) -> Result<Destination, BrokerError>;

    async fn create_temporary_queue(&mut self) -> Result<Destination, BrokerError>;

    async fn delete_temporary_queue(&mut self, destination: &Destination) -> Result<(), BrokerError>;

    async fn create_producer(&mut self, destination: &Destination) -> Result<Box<dyn MessageProducer>, BrokerError>;

    async fn create_consumer(
        &mut self,
        destination: &Destination,
        selector: Option<MessageSelector>,
    ) -> Result<Box<dyn MessageConsumer>, BrokerError>;

    /// Close the session; temporary queues it created are deleted.
    async fn close(&mut self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait MessageProducer: Send {
    /// Send and return the broker-assigned message id.
    async fn send(&mut self, message: QueueMessage, options: &SendOptions) -> Result<String, BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait MessageConsumer: Send {
    /// `None` waits forever, `Some(Duration::ZERO)` does not wait.
    /// `Ok(None)` means nothing arrived in time.
    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<QueueMessage>, BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError>;
}
