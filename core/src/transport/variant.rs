/*
 * variant.rs
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

//! Closed sets of connection variants, one per binding.
//!
//! Binding-only operations stay on the concrete connection type; match on the
//! variant to reach them.

use crate::protocol::http::{HttpReceiverConnection, HttpSenderConnection};
use crate::protocol::mail::{MailReceiverConnection, MailSenderConnection};
use crate::protocol::queue::{QueueReceiverConnection, QueueSenderConnection};
use crate::transport::error::TransportError;
use crate::transport::headers::TransportHeaders;
use crate::transport::kinds::TransportKind;
use crate::transport::message::{Message, MessageFactory};
use crate::transport::state::ExchangeState;

/// Forward one call to whichever connection the variant holds.
macro_rules! each {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Self::Http($c) => $body,
            Self::Queue($c) => $body,
            Self::Mail($c) => $body,
        }
    };
}

/// Client side of an exchange over any binding.
pub enum OutboundConnection {
    Http(HttpSenderConnection),
    Queue(QueueSenderConnection),
    Mail(MailSenderConnection),
}

impl OutboundConnection {
    pub fn kind(&self) -> TransportKind {
        each!(self, c => c.kind())
    }

    pub fn uri(&self) -> String {
        each!(self, c => c.uri())
    }

    pub fn state(&self) -> ExchangeState {
        each!(self, c => c.state())
    }

    pub fn add_request_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TransportError> {
        each!(self, c => c.add_request_header(name, value))
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        each!(self, c => c.send(message).await)
    }

    pub async fn receive(&mut self, factory: &dyn MessageFactory) -> Result<Option<Message>, TransportError> {
        each!(self, c => c.receive(factory).await)
    }

    pub fn has_fault(&self) -> bool {
        each!(self, c => c.has_fault())
    }

    pub fn has_error(&self) -> bool {
        each!(self, c => c.has_error())
    }

    pub fn error_message(&self) -> Option<String> {
        each!(self, c => c.error_message())
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        each!(self, c => c.close().await)
    }
}

impl From<HttpSenderConnection> for OutboundConnection {
    fn from(c: HttpSenderConnection) -> Self {
        OutboundConnection::Http(c)
    }
}

impl From<QueueSenderConnection> for OutboundConnection {
    fn from(c: QueueSenderConnection) -> Self {
        OutboundConnection::Queue(c)
    }
}

impl From<MailSenderConnection> for OutboundConnection {
    fn from(c: MailSenderConnection) -> Self {
        OutboundConnection::Mail(c)
    }
}

/// Server side of an exchange over any binding.
pub enum InboundConnection {
    Http(HttpReceiverConnection),
    Queue(QueueReceiverConnection),
    Mail(MailReceiverConnection),
}

impl InboundConnection {
    pub fn kind(&self) -> TransportKind {
        each!(self, c => c.kind())
    }

    pub fn state(&self) -> ExchangeState {
        each!(self, c => c.state())
    }

    pub fn request_headers(&self) -> &TransportHeaders {
        each!(self, c => c.request_headers())
    }

    pub fn receive(&self, factory: &dyn MessageFactory) -> Result<Message, TransportError> {
        each!(self, c => c.receive(factory))
    }

    pub fn add_response_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TransportError> {
        each!(self, c => c.add_response_header(name, value))
    }

    pub fn set_fault(&mut self, fault: bool) {
        each!(self, c => c.set_fault(fault))
    }

    pub fn has_fault(&self) -> bool {
        each!(self, c => c.has_fault())
    }

    pub fn has_replied(&self) -> bool {
        each!(self, c => c.has_replied())
    }

    /// Tell the transport no endpoint handles this request. Only HTTP reports it (404).
    pub fn endpoint_not_found(&mut self) {
        if let Self::Http(c) = self {
            c.binding_mut().endpoint_not_found();
        }
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        each!(self, c => c.send(message).await)
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        each!(self, c => c.close().await)
    }
}
