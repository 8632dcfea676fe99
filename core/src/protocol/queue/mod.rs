/*
 * mod.rs
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

//! Queue-messaging binding over a message broker.
//!
//! The sender publishes the request with a reply-to destination (named, or a
//! temporary queue owned by the exchange) and receives the reply correlated
//! by message id. The receiver answers one inbound message per connection.

pub mod broker;
pub mod memory;
pub mod properties;
mod receiver;
mod sender;

use bytes::Bytes;

pub use broker::{
    Broker, BrokerError, BrokerSession, Destination, MessageConsumer, MessageProducer, MessageSelector,
    PropertyValue, QueueBody, QueueMessage, SendOptions,
};
pub use memory::MemoryBroker;
pub use receiver::{handle_message, QueueMessageReceiver, QueueReceiverBinding, QueueReceiverConnection};
pub use sender::{QueueMessageSender, QueueSenderBinding, QueueSenderConnection};

use crate::transport::{TransportError, WireMessage};

/// Body, properties and fault flag of a broker message as seen by a connection.
pub(crate) fn to_wire(message: &QueueMessage) -> Result<WireMessage, TransportError> {
    let body = match &message.body {
        QueueBody::Bytes(b) => b.clone(),
        QueueBody::Text(t) => Bytes::from(t.clone().into_bytes()),
        QueueBody::Map(_) => {
            return Err(TransportError::UnsupportedPayload(
                "map messages cannot carry a payload; use bytes or text".to_string(),
            ))
        }
    };
    Ok(WireMessage::new(
        properties::extract_headers(message),
        body,
        properties::is_fault(message),
    ))
}
