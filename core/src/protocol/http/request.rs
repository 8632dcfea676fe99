/*
 * request.rs
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

//! HTTP requests: the outbound builder used by the client and the parsed
//! inbound request handed to the receiver.

use std::fmt;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::http::h1::{body_framing, H1Handler, H1Parser, MessageKind, ParseState, StartLine};
use crate::protocol::http::HttpClientError;
use crate::transport::TransportHeaders;

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Other(String),
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request: method, path, headers, body. Sent with `HttpConnection::write_request`.
pub struct RequestBuilder {
    pub method: Method,
    pub path: String,
    pub headers: TransportHeaders,
    pub body: Option<Bytes>,
}

impl RequestBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: TransportHeaders::new(),
            body: None,
        }
    }

    /// Add a header; repeated names are sent as repeated header lines.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.add(name, value);
        self
    }

    /// Set the body; Content-Length is always sent for it.
    pub fn body(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.body = Some(data.into());
        self
    }
}

/// Inbound request as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: TransportHeaders,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: TransportHeaders::new(),
            body: Bytes::new(),
        }
    }

    /// Whether the client asked to close after this exchange.
    pub fn wants_close(&self) -> bool {
        self.headers
            .get("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }
}

#[derive(Default)]
struct RequestCollector {
    method: Option<Method>,
    path: String,
    headers: TransportHeaders,
    body: BytesMut,
    complete: bool,
}

impl H1Handler for RequestCollector {
    fn start_line(&mut self, line: StartLine<'_>) {
        if let StartLine::Request { method, target } = line {
            self.method = Some(Method::parse(method));
            self.path = target.to_string();
        }
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.add(name, value);
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn complete(&mut self) {
        self.complete = true;
    }
}

/// Read one request. `buf` carries bytes over between requests on the same
/// connection. `Ok(None)` when the peer closed before sending anything.
pub async fn read_http_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<Option<HttpRequest>, HttpClientError> {
    let mut parser = H1Parser::new(MessageKind::Request);
    let mut collector = RequestCollector::default();
    loop {
        parser.receive(buf, &mut collector)?;
        if parser.state() == ParseState::HeadersComplete {
            let (length, chunked) = body_framing(collector.headers.iter());
            // requests without framing have no body
            parser.set_body_mode(Some(length.unwrap_or(0)).filter(|_| !chunked), chunked, &mut collector);
            continue;
        }
        if collector.complete {
            break;
        }
        let n = reader.read_buf(buf).await?;
        if n == 0 {
            if parser.state() == ParseState::StartLine && collector.method.is_none() {
                return Ok(None);
            }
            if !parser.finish_on_eof(&mut collector) {
                return Err(HttpClientError::new("connection closed in the middle of a request"));
            }
        }
    }
    let method = collector
        .method
        .ok_or_else(|| HttpClientError::new("request line missing"))?;
    Ok(Some(HttpRequest {
        method,
        path: collector.path,
        headers: collector.headers,
        body: collector.body.freeze(),
    }))
}
