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

//! HTTP receiver: wraps one inbound request; the reply becomes the response.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::protocol::http::request::{read_http_request, HttpRequest, Method};
use crate::protocol::http::response::{write_response, HttpResponse};
use crate::server::{dispatch, MessageHandler, ReceiverHandle};
use crate::transport::{
    InboundConnection, ReceiverBinding, ReceiverConnection, TransportError, TransportKind, WireMessage,
};

pub type HttpReceiverConnection = ReceiverConnection<HttpReceiverBinding>;

/// Receiver-side HTTP binding around one request.
pub struct HttpReceiverBinding {
    method: Method,
    path: String,
    request: WireMessage,
    response: HttpResponse,
    replied: bool,
    not_found: bool,
}

impl HttpReceiverBinding {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            method: request.method,
            path: request.path,
            request: WireMessage::new(request.headers, request.body, false),
            response: HttpResponse::new(202),
            replied: false,
            not_found: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Answer 404 instead of 202 when nothing is replied.
    pub fn endpoint_not_found(&mut self) {
        self.not_found = true;
    }

    /// Response for the outcome: 200 or 500 for a reply, 404 when no
    /// endpoint was found, otherwise 202.
    pub fn into_response(self) -> HttpResponse {
        if self.replied {
            self.response
        } else if self.not_found {
            HttpResponse::new(404)
        } else {
            HttpResponse::new(202)
        }
    }
}

#[async_trait]
impl ReceiverBinding for HttpReceiverBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn request(&self) -> &WireMessage {
        &self.request
    }

    async fn prepare_reply(&mut self, reply: WireMessage) -> Result<(), TransportError> {
        let status = if reply.fault { 500 } else { 200 };
        self.response = HttpResponse {
            status,
            reason: None,
            headers: reply.headers,
            body: reply.body,
        };
        Ok(())
    }

    async fn flush_reply(&mut self) -> Result<bool, TransportError> {
        self.replied = true;
        Ok(true)
    }

    async fn release(&mut self, _replied: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Run one request through `handler` and map the outcome to a response.
/// Only POST carries a request message; other methods get 405.
pub async fn handle_http_exchange(request: HttpRequest, handler: &dyn MessageHandler) -> HttpResponse {
    if request.method != Method::Post {
        debug!(method = %request.method, path = %request.path, "method not allowed");
        return HttpResponse::new(405).with_header("Allow", "POST");
    }
    let mut connection = InboundConnection::Http(ReceiverConnection::new(HttpReceiverBinding::new(request)));
    if let Err(e) = dispatch(handler, &mut connection).await {
        error!(error = %e, "could not handle incoming HTTP request");
        return HttpResponse::new(500);
    }
    match connection {
        InboundConnection::Http(c) => c.into_binding().into_response(),
        _ => HttpResponse::new(500),
    }
}

/// Serve requests on one client stream until it closes or asks to.
pub async fn serve_connection<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    handler: &dyn MessageHandler,
) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(8192);
    loop {
        let request = match read_http_request(stream, &mut buf).await {
            Ok(Some(r)) => r,
            Ok(None) => return Ok(()),
            Err(e) => {
                let _ = write_response(stream, &HttpResponse::new(400)).await;
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };
        let close = request.wants_close();
        let response = handle_http_exchange(request, handler).await;
        write_response(stream, &response)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        if close {
            return Ok(());
        }
    }
}

/// Accepts HTTP/1.1 connections and answers them through a `MessageHandler`.
pub struct HttpMessageReceiver {
    listener: TcpListener,
}

impl HttpMessageReceiver {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::io("bind HTTP listener", e))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::io("HTTP listener address", e))
    }

    pub fn start(self, handler: Arc<dyn MessageHandler>) -> Result<ReceiverHandle, TransportError> {
        let name = format!("http://{}", self.local_addr()?);
        info!(listener = %name, "starting HTTP receiver");
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(self.listener, handler, stop_rx));
        Ok(ReceiverHandle::new(name, stop_tx, task))
    }
}

async fn accept_loop(listener: TcpListener, handler: Arc<dyn MessageHandler>, mut stop: watch::Receiver<bool>) {
    let mut clients = JoinSet::new();
    loop {
        if *stop.borrow() {
            break;
        }
        let accepted = tokio::select! {
            _ = stop.changed() => break,
            r = listener.accept() => r,
        };
        match accepted {
            Ok((mut stream, peer)) => {
                let handler = Arc::clone(&handler);
                clients.spawn(async move {
                    if let Err(e) = serve_connection(&mut stream, handler.as_ref()).await {
                        debug!(%peer, error = %e, "HTTP client connection ended with error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
        while let Some(done) = clients.try_join_next() {
            if let Err(e) = done {
                error!(error = %e, "HTTP connection task failed");
            }
        }
    }
    info!("stopping HTTP receiver");
    clients.abort_all();
    while clients.join_next().await.is_some() {}
}
