/*
 * message.rs
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

//! Message exchanged over a connection: opaque payload, headers and a fault flag.

use bytes::Bytes;

use crate::transport::error::TransportError;
use crate::transport::headers::TransportHeaders;

/// Opaque byte payload plus header multimap plus fault signal.
///
/// The payload is never interpreted here; envelope semantics belong to whoever
/// supplies the [`MessageFactory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    headers: TransportHeaders,
    fault: bool,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            headers: TransportHeaders::new(),
            fault: false,
        }
    }

    /// A fault message: the payload describes an error rather than a result.
    pub fn fault(payload: impl Into<Bytes>) -> Self {
        Self {
            fault: true,
            ..Self::new(payload)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn headers(&self) -> &TransportHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut TransportHeaders {
        &mut self.headers
    }

    pub fn is_fault(&self) -> bool {
        self.fault
    }

    pub fn set_fault(&mut self, fault: bool) {
        self.fault = fault;
    }
}

/// Turns wire bytes into messages. Consumed by every binding's `receive`.
pub trait MessageFactory: Send + Sync {
    /// Build a message from a received payload. Headers and fault flag are attached by the connection.
    fn create_message(&self, payload: Bytes) -> Result<Message, TransportError>;

    fn create_empty_message(&self) -> Message;
}

/// Factory that keeps the payload as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageFactory;

impl MessageFactory for DefaultMessageFactory {
    fn create_message(&self, payload: Bytes) -> Result<Message, TransportError> {
        Ok(Message::new(payload))
    }

    fn create_empty_message(&self) -> Message {
        Message::default()
    }
}
