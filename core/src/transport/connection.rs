/*
 * connection.rs
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

//! Connection drivers: one shared state machine, bindings plug in named transitions.
//!
//! A sender binding implements `prepare_request` (build the native request with
//! final headers), `publish` (hand it to the transport) and `await_reply`
//! (block until a correlated reply, a timeout, or a definite "nothing coming").
//! A receiver binding implements `prepare_reply`, `flush_reply` and `release`.
//! The drivers own ordering: headers are applied before the payload is written,
//! and the payload is written before anything is published.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::transport::error::TransportError;
use crate::transport::headers::TransportHeaders;
use crate::transport::kinds::TransportKind;
use crate::transport::message::{Message, MessageFactory};
use crate::transport::state::{ExchangeState, Role};

/// Payload, headers and fault flag as they cross a binding boundary.
#[derive(Debug, Clone, Default)]
pub struct WireMessage {
    pub headers: TransportHeaders,
    pub body: Bytes,
    pub fault: bool,
}

impl WireMessage {
    pub fn new(headers: TransportHeaders, body: Bytes, fault: bool) -> Self {
        Self { headers, body, fault }
    }
}

/// Transport-specific half of a client-initiated exchange.
#[async_trait]
pub trait SenderBinding: Send {
    fn kind(&self) -> TransportKind;

    /// Destination this connection was opened for.
    fn uri(&self) -> String;

    /// Build the native request. `headers` are final.
    async fn prepare_request(
        &mut self,
        headers: &TransportHeaders,
        body: Bytes,
    ) -> Result<(), TransportError>;

    /// Hand the prepared request to the transport.
    async fn publish(&mut self) -> Result<(), TransportError>;

    /// Wait for the correlated reply. `Ok(None)` means no response.
    async fn await_reply(&mut self) -> Result<Option<WireMessage>, TransportError>;

    /// Transport-level error (e.g. HTTP non-2xx) that is not a fault.
    fn has_error(&self) -> bool {
        false
    }

    fn error_message(&self) -> Option<String> {
        None
    }

    /// Release every native resource. Called at most once.
    async fn release(&mut self) -> Result<(), TransportError>;
}

/// Transport-specific half of a server-side exchange built around one inbound event.
#[async_trait]
pub trait ReceiverBinding: Send {
    fn kind(&self) -> TransportKind;

    /// The inbound request carried by the event.
    fn request(&self) -> &WireMessage;

    /// Build the native reply from final headers, body and fault flag.
    async fn prepare_reply(&mut self, reply: WireMessage) -> Result<(), TransportError>;

    /// Transmit the prepared reply. `Ok(false)` when the request named
    /// nowhere to reply to and nothing was sent.
    async fn flush_reply(&mut self) -> Result<bool, TransportError>;

    /// Release every native resource. `replied` is false when no reply was sent.
    async fn release(&mut self, replied: bool) -> Result<(), TransportError>;
}

/// Outcome of a release error given what happened before it.
fn settle_close(
    result: Result<(), TransportError>,
    completed: bool,
    failed_before: bool,
    kind: TransportKind,
) -> Result<(), TransportError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if completed || failed_before => {
            warn!(transport = %kind, error = %e, "failed to release connection resources");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Client side of one request/response exchange over binding `B`.
pub struct SenderConnection<B: SenderBinding> {
    binding: B,
    state: ExchangeState,
    request_headers: TransportHeaders,
    fault: bool,
    failed: bool,
}

impl<B: SenderBinding> SenderConnection<B> {
    pub fn new(binding: B) -> Self {
        Self {
            binding,
            state: ExchangeState::initial(Role::Sender),
            request_headers: TransportHeaders::new(),
            fault: false,
            failed: false,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.binding.kind()
    }

    pub fn uri(&self) -> String {
        self.binding.uri()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    fn note<T>(&mut self, r: Result<T, TransportError>) -> Result<T, TransportError> {
        if r.is_err() {
            self.failed = true;
        }
        r
    }

    /// Add a request header. Only valid before the request is written.
    pub fn add_request_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TransportError> {
        if self.state != ExchangeState::Created {
            return Err(TransportError::IllegalState(format!(
                "cannot add request header in state {}",
                self.state
            )));
        }
        self.request_headers.add(name, value);
        Ok(())
    }

    /// Write the request and publish it. Headers added earlier and the message's
    /// own headers are applied before the native request is built.
    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.state != ExchangeState::Created {
            return Err(TransportError::IllegalState(format!(
                "cannot send in state {}",
                self.state
            )));
        }
        let mut headers = self.request_headers.clone();
        headers.extend_from(message.headers());
        let r = self
            .binding
            .prepare_request(&headers, message.payload().clone())
            .await;
        self.note(r)?;
        self.state.advance(Role::Sender, ExchangeState::RequestWritten)?;
        let r = self.binding.publish().await;
        self.note(r)?;
        self.state.advance(Role::Sender, ExchangeState::AwaitingReply)?;
        debug!(transport = %self.kind(), uri = %self.uri(), "request published");
        Ok(())
    }

    /// Wait for the reply. `Ok(None)` is "no response": timed out, or the
    /// transport said nothing is coming.
    pub async fn receive(
        &mut self,
        factory: &dyn MessageFactory,
    ) -> Result<Option<Message>, TransportError> {
        if self.state != ExchangeState::AwaitingReply {
            return Err(TransportError::IllegalState(format!(
                "cannot receive in state {}",
                self.state
            )));
        }
        let r = self.binding.await_reply().await;
        let reply = self.note(r)?;
        self.state.advance(Role::Sender, ExchangeState::Complete)?;
        let Some(wire) = reply else {
            debug!(transport = %self.kind(), uri = %self.uri(), "no response");
            return Ok(None);
        };
        let mut message = factory.create_message(wire.body)?;
        message.headers_mut().extend_from(&wire.headers);
        message.set_fault(wire.fault);
        self.fault = wire.fault;
        Ok(Some(message))
    }

    /// Whether the received reply is a fault. False until a reply exists.
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    pub fn has_error(&self) -> bool {
        self.binding.has_error()
    }

    pub fn error_message(&self) -> Option<String> {
        self.binding.error_message()
    }

    /// Release native resources. Safe to call repeatedly and before send/receive.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.state == ExchangeState::Closed {
            return Ok(());
        }
        let completed = self.state.is_complete();
        self.state.advance(Role::Sender, ExchangeState::Closed)?;
        let r = self.binding.release().await;
        settle_close(r, completed, self.failed, self.binding.kind())
    }
}

/// Server side of one exchange, wrapping one inbound transport event.
pub struct ReceiverConnection<B: ReceiverBinding> {
    binding: B,
    state: ExchangeState,
    response_headers: TransportHeaders,
    fault: bool,
    failed: bool,
    replied: bool,
}

impl<B: ReceiverBinding> ReceiverConnection<B> {
    pub fn new(binding: B) -> Self {
        Self {
            binding,
            state: ExchangeState::initial(Role::Receiver),
            response_headers: TransportHeaders::new(),
            fault: false,
            failed: false,
            replied: false,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.binding.kind()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    /// Give back the binding, e.g. to turn a finished HTTP exchange into a response.
    pub fn into_binding(self) -> B {
        self.binding
    }

    /// Headers of the inbound request, without building a message.
    pub fn request_headers(&self) -> &TransportHeaders {
        &self.binding.request().headers
    }

    /// The inbound request as a message.
    pub fn receive(&self, factory: &dyn MessageFactory) -> Result<Message, TransportError> {
        let request = self.binding.request();
        let mut message = factory.create_message(request.body.clone())?;
        message.headers_mut().extend_from(&request.headers);
        message.set_fault(request.fault);
        Ok(message)
    }

    pub fn add_response_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TransportError> {
        if self.state != ExchangeState::AwaitingReply {
            return Err(TransportError::IllegalState(format!(
                "cannot add response header in state {}",
                self.state
            )));
        }
        self.response_headers.add(name, value);
        Ok(())
    }

    /// Mark the reply as a fault regardless of the message's own flag.
    pub fn set_fault(&mut self, fault: bool) {
        self.fault = fault;
    }

    /// Whether the reply (sent or about to be sent) is a fault.
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    pub fn has_replied(&self) -> bool {
        self.replied
    }

    /// Write and transmit the reply.
    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.state != ExchangeState::AwaitingReply {
            return Err(TransportError::IllegalState(format!(
                "cannot reply in state {}",
                self.state
            )));
        }
        self.fault = self.fault || message.is_fault();
        let mut headers = self.response_headers.clone();
        headers.extend_from(message.headers());
        let reply = WireMessage::new(headers, message.payload().clone(), self.fault);
        let r = self.binding.prepare_reply(reply).await;
        self.note(r)?;
        self.state.advance(Role::Receiver, ExchangeState::ReplyWritten)?;
        let r = self.binding.flush_reply().await;
        self.replied = self.note(r)?;
        self.state.advance(Role::Receiver, ExchangeState::Complete)?;
        Ok(())
    }

    fn note<T>(&mut self, r: Result<T, TransportError>) -> Result<T, TransportError> {
        if r.is_err() {
            self.failed = true;
        }
        r
    }

    /// Release native resources. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.state == ExchangeState::Closed {
            return Ok(());
        }
        let completed = self.state.is_complete();
        self.state.advance(Role::Receiver, ExchangeState::Closed)?;
        let r = self.binding.release(self.replied).await;
        settle_close(r, completed, self.failed, self.binding.kind())
    }
}
