/*
 * client.rs
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

//! Message senders for each binding and a client that picks one by URI.

use tracing::warn;

use crate::protocol::http::HttpMessageSender;
use crate::protocol::mail::MailMessageSender;
use crate::protocol::queue::QueueMessageSender;
use crate::transport::error::TransportError;
use crate::transport::message::{DefaultMessageFactory, Message, MessageFactory};
use crate::transport::variant::OutboundConnection;

/// Opens outbound connections for the URIs its binding understands.
#[derive(Clone)]
pub enum MessageSender {
    Http(HttpMessageSender),
    Queue(QueueMessageSender),
    Mail(MailMessageSender),
}

impl MessageSender {
    pub fn supports(&self, uri: &str) -> bool {
        match self {
            MessageSender::Http(s) => s.supports(uri),
            MessageSender::Queue(s) => s.supports(uri),
            MessageSender::Mail(s) => s.supports(uri),
        }
    }

    pub async fn open(&self, uri: &str) -> Result<OutboundConnection, TransportError> {
        Ok(match self {
            MessageSender::Http(s) => s.open(uri).await?.into(),
            MessageSender::Queue(s) => s.open(uri).await?.into(),
            MessageSender::Mail(s) => s.open(uri).await?.into(),
        })
    }
}

impl From<HttpMessageSender> for MessageSender {
    fn from(s: HttpMessageSender) -> Self {
        MessageSender::Http(s)
    }
}

impl From<QueueMessageSender> for MessageSender {
    fn from(s: QueueMessageSender) -> Self {
        MessageSender::Queue(s)
    }
}

impl From<MailMessageSender> for MessageSender {
    fn from(s: MailMessageSender) -> Self {
        MessageSender::Mail(s)
    }
}

/// Runs whole exchanges: the first sender that supports the URI wins.
pub struct MessageClient {
    senders: Vec<MessageSender>,
    factory: Box<dyn MessageFactory>,
}

impl Default for MessageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageClient {
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
            factory: Box::new(DefaultMessageFactory),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<MessageSender>) -> Self {
        self.senders.push(sender.into());
        self
    }

    pub fn with_factory(mut self, factory: impl MessageFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Open a connection on the first sender supporting `uri`.
    pub async fn open(&self, uri: &str) -> Result<OutboundConnection, TransportError> {
        let sender = self
            .senders
            .iter()
            .find(|s| s.supports(uri))
            .ok_or_else(|| TransportError::address(uri, "no message sender supports this URI"))?;
        sender.open(uri).await
    }

    /// Open, send, receive and always close. `Ok(None)` means no response.
    pub async fn send_and_receive(&self, uri: &str, request: &Message) -> Result<Option<Message>, TransportError> {
        let mut connection = self.open(uri).await?;
        let result = exchange(&mut connection, request, self.factory.as_ref()).await;
        let closed = connection.close().await;
        match (result, closed) {
            (Ok(reply), Ok(())) => Ok(reply),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(uri = %uri, error = %close_err, "failed to close connection after error");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }
}

async fn exchange(
    connection: &mut OutboundConnection,
    request: &Message,
    factory: &dyn MessageFactory,
) -> Result<Option<Message>, TransportError> {
    connection.send(request).await?;
    let reply = connection.receive(factory).await?;
    // a 500 carrying a fault is a reply, not a transport error
    if connection.has_error() && !connection.has_fault() {
        return Err(TransportError::io(
            "receive",
            connection
                .error_message()
                .unwrap_or_else(|| "transport reported an error".to_string()),
        ));
    }
    Ok(reply)
}
