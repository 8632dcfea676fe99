/*
 * endpoint.rs
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

//! Endpoint wiring: turn an inbound connection into a message, invoke the
//! endpoint, and reply with what it returns.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::server::handler::MessageHandler;
use crate::transport::{InboundConnection, Message, MessageFactory, TransportError};

#[derive(Debug, Error)]
pub enum EndpointError {
    /// Nothing is mapped to handle this request.
    #[error("no endpoint found for request")]
    NotFound,
    /// The endpoint failed; the reason becomes a fault reply.
    #[error("endpoint failed: {0}")]
    Failed(String),
}

/// Application code answering requests. `Ok(None)` is a one-way request.
#[async_trait]
pub trait MessageEndpoint: Send + Sync {
    async fn invoke(&self, request: Message) -> Result<Option<Message>, EndpointError>;
}

/// [`MessageHandler`] that reads the request with `factory` and answers with `endpoint`.
///
/// Over HTTP the status follows the outcome: 200 for a reply, 202 for none,
/// 404 when no endpoint is found and 500 for a fault.
pub struct EndpointHandler {
    factory: Arc<dyn MessageFactory>,
    endpoint: Arc<dyn MessageEndpoint>,
}

impl EndpointHandler {
    pub fn new(factory: Arc<dyn MessageFactory>, endpoint: Arc<dyn MessageEndpoint>) -> Self {
        Self { factory, endpoint }
    }
}

#[async_trait]
impl MessageHandler for EndpointHandler {
    async fn handle(&self, connection: &mut InboundConnection) -> Result<(), TransportError> {
        let request = connection.receive(self.factory.as_ref())?;
        let reply = match self.endpoint.invoke(request).await {
            Ok(reply) => reply,
            Err(EndpointError::NotFound) => {
                debug!(transport = %connection.kind(), "no endpoint found");
                connection.endpoint_not_found();
                return Ok(());
            }
            Err(EndpointError::Failed(reason)) => {
                warn!(transport = %connection.kind(), %reason, "endpoint failed; replying with fault");
                Some(Message::fault(reason.into_bytes()))
            }
        };
        match reply {
            Some(reply) => {
                if reply.is_fault() {
                    connection.set_fault(true);
                }
                connection.send(&reply).await
            }
            None => Ok(()),
        }
    }
}
