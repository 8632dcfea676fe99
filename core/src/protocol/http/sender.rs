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

//! HTTP sender: POST the request, read the response on the same connection.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::HttpSettings;
use crate::protocol::http::client::{HttpClient, HttpClientError};
use crate::protocol::http::connection::HttpConnection;
use crate::protocol::http::request::{Method, RequestBuilder};
use crate::protocol::http::response::HttpResponse;
use crate::transport::{SenderBinding, SenderConnection, TransportError, TransportHeaders, TransportKind, WireMessage};
use crate::uri::HttpUri;

pub type HttpSenderConnection = SenderConnection<HttpSenderBinding>;

fn io_error(operation: &str, uri: &HttpUri, e: HttpClientError) -> TransportError {
    TransportError::io(format!("{} {}", operation, uri), e)
}

/// Sender-side HTTP binding: one connection per exchange.
pub struct HttpSenderBinding {
    uri: HttpUri,
    read_timeout: Option<Duration>,
    connection: Option<HttpConnection>,
    request: Option<RequestBuilder>,
    status: Option<(u16, String)>,
}

impl HttpSenderBinding {
    /// Status code and reason of the response, once read.
    pub fn status(&self) -> Option<(u16, &str)> {
        self.status.as_ref().map(|(c, r)| (*c, r.as_str()))
    }

    pub fn connection_mut(&mut self) -> Option<&mut HttpConnection> {
        self.connection.as_mut()
    }

    fn connection(&mut self) -> Result<&mut HttpConnection, TransportError> {
        self.connection
            .as_mut()
            .ok_or_else(|| TransportError::IllegalState("HTTP connection already released".to_string()))
    }
}

/// No content: 202/204 or an empty body. Distinguishes one-way operations
/// from replies.
fn is_no_response(response: &HttpResponse) -> bool {
    matches!(response.status, 202 | 204) || response.body.is_empty()
}

#[async_trait]
impl SenderBinding for HttpSenderBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn uri(&self) -> String {
        self.uri.to_string()
    }

    async fn prepare_request(&mut self, headers: &TransportHeaders, body: Bytes) -> Result<(), TransportError> {
        let mut request = RequestBuilder::new(Method::Post, self.uri.path());
        for (name, value) in headers.iter() {
            request.header(name, value);
        }
        request.body(body);
        self.request = Some(request);
        Ok(())
    }

    async fn publish(&mut self) -> Result<(), TransportError> {
        let request = self
            .request
            .take()
            .ok_or_else(|| TransportError::IllegalState("no request prepared".to_string()))?;
        let uri = self.uri.clone();
        self.connection()?
            .write_request(&request)
            .await
            .map_err(|e| io_error("POST", &uri, e))
    }

    async fn await_reply(&mut self) -> Result<Option<WireMessage>, TransportError> {
        let uri = self.uri.clone();
        let read_timeout = self.read_timeout;
        let response = self
            .connection()?
            .read_response(read_timeout)
            .await
            .map_err(|e| io_error("read response from", &uri, e))?;
        debug!(uri = %self.uri, status = response.status, length = response.body.len(), "response received");
        self.status = Some((response.status, response.reason_phrase().to_string()));
        if is_no_response(&response) {
            return Ok(None);
        }
        let fault = response.status == 500;
        Ok(Some(WireMessage::new(response.headers, response.body, fault)))
    }

    fn has_error(&self) -> bool {
        self.status.as_ref().is_some_and(|(code, _)| code / 100 != 2)
    }

    fn error_message(&self) -> Option<String> {
        self.status
            .as_ref()
            .filter(|(code, _)| code / 100 != 2)
            .map(|(code, reason)| format!("{} {}", code, reason))
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        if let Some(mut connection) = self.connection.take() {
            connection
                .shutdown()
                .await
                .map_err(|e| io_error("close connection to", &self.uri, e))?;
        }
        Ok(())
    }
}

/// Opens HTTP exchanges for `http:` and `https:` URIs.
#[derive(Debug, Clone, Default)]
pub struct HttpMessageSender {
    settings: HttpSettings,
}

impl HttpMessageSender {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.read_timeout = timeout;
        self
    }

    pub fn supports(&self, uri: &str) -> bool {
        HttpUri::parse(uri).is_ok()
    }

    /// Parse the URI and connect.
    pub async fn open(&self, uri: &str) -> Result<HttpSenderConnection, TransportError> {
        let uri = HttpUri::parse(uri)?;
        let connection = HttpClient::connect(uri.host(), uri.port(), uri.is_secure(), self.settings.connect_timeout)
            .await
            .map_err(|e| io_error("connect to", &uri, e))?;
        Ok(SenderConnection::new(HttpSenderBinding {
            uri,
            read_timeout: self.settings.read_timeout,
            connection: Some(connection),
            request: None,
            status: None,
        }))
    }
}
