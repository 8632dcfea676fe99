/*
 * response.rs
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

//! HTTP responses: read by the client, written by the receiver.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::http::h1::{body_framing, H1Handler, H1Parser, MessageKind, ParseState, StartLine};
use crate::protocol::http::HttpClientError;
use crate::transport::TransportHeaders;

/// Status, headers and fully buffered body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: TransportHeaders,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: TransportHeaders::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reason phrase as received, else the standard one.
    pub fn reason_phrase(&self) -> &str {
        self.reason.as_deref().unwrap_or_else(|| standard_reason(self.status))
    }
}

pub fn standard_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[derive(Default)]
struct ResponseCollector {
    status: Option<(u16, Option<String>)>,
    headers: TransportHeaders,
    body: BytesMut,
    complete: bool,
}

impl H1Handler for ResponseCollector {
    fn start_line(&mut self, line: StartLine<'_>) {
        if let StartLine::Status { code, reason } = line {
            self.status = Some((code, reason.map(str::to_string)));
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

/// Read a final (non-1xx) response. Interim responses are skipped.
pub async fn read_http_response<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<HttpResponse, HttpClientError> {
    let mut parser = H1Parser::new(MessageKind::Response);
    let mut collector = ResponseCollector::default();
    loop {
        parser.receive(buf, &mut collector)?;
        if parser.state() == ParseState::HeadersComplete {
            let code = collector.status.as_ref().map(|(c, _)| *c).unwrap_or(0);
            if (100..200).contains(&code) {
                parser.reset();
                collector = ResponseCollector::default();
                continue;
            }
            let (length, chunked) = body_framing(collector.headers.iter());
            if code == 204 || code == 304 {
                parser.set_body_mode(Some(0), false, &mut collector);
            } else {
                parser.set_body_mode(length, chunked, &mut collector);
            }
            continue;
        }
        if collector.complete {
            break;
        }
        let n = reader.read_buf(buf).await?;
        if n == 0 && !parser.finish_on_eof(&mut collector) {
            return Err(HttpClientError::new("HTTP connection closed before the response was complete"));
        }
    }
    let (status, reason) = collector
        .status
        .ok_or_else(|| HttpClientError::new("status line missing"))?;
    Ok(HttpResponse {
        status,
        reason,
        headers: collector.headers,
        body: collector.body.freeze(),
    })
}

/// Write `response` as HTTP/1.1. Content-Length always reflects the body.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &HttpResponse,
) -> Result<(), HttpClientError> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, response.reason_phrase());
    for (name, value) in response.headers.iter() {
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", response.body.len()));
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interim_response_is_skipped() {
        let wire = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        let mut reader = &wire[..];
        let mut buf = BytesMut::new();
        let response = read_http_response(&mut reader, &mut buf).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn body_until_close() {
        let wire = b"HTTP/1.0 500 Server Error\r\nContent-Type: text/xml\r\n\r\n<fault/>";
        let mut reader = &wire[..];
        let mut buf = BytesMut::new();
        let response = read_http_response(&mut reader, &mut buf).await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.reason.as_deref(), Some("Server Error"));
        assert_eq!(response.body.as_ref(), b"<fault/>");
    }

    #[tokio::test]
    async fn no_content_has_no_body() {
        let wire = b"HTTP/1.1 204 No Content\r\n\r\n";
        let mut reader = &wire[..];
        let mut buf = BytesMut::new();
        let response = read_http_response(&mut reader, &mut buf).await.unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn framed_response_completes_on_open_stream() {
        let (mut client, mut server) = tokio::io::duplex(256);
        server
            .write_all(b"HTTP/1.1 204 No Content\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc")
            .await
            .unwrap();
        let mut buf = BytesMut::new();
        let first = read_http_response(&mut client, &mut buf).await.unwrap();
        assert_eq!(first.status, 204);
        let second = read_http_response(&mut client, &mut buf).await.unwrap();
        assert_eq!(second.body.as_ref(), b"abc");
        drop(server);
    }

    #[tokio::test]
    async fn written_response_reads_back() {
        let response = HttpResponse::new(202)
            .with_header("Content-Length", "99")
            .with_header("X-Trace", "7");
        let mut out = Vec::new();
        write_response(&mut out, &response).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 202 Accepted\r\nX-Trace: 7\r\nContent-Length: 0\r\n\r\n"
        );
    }
}
