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

//! HTTP connection: one TCP or TLS stream carrying HTTP/1.1 exchanges.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::net::NetStream;
use crate::protocol::http::client::HttpClientError;
use crate::protocol::http::request::RequestBuilder;
use crate::protocol::http::response::{read_http_response, HttpResponse};

pub struct HttpConnection {
    stream: NetStream,
    host: String,
    port: u16,
    secure: bool,
    read_buf: BytesMut,
}

impl HttpConnection {
    pub fn new(stream: NetStream, host: String, port: u16, secure: bool) -> Self {
        Self {
            stream,
            host,
            port,
            secure,
            read_buf: BytesMut::with_capacity(8192),
        }
    }

    fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Write the request line, headers and body, then flush.
    pub async fn write_request(&mut self, request: &RequestBuilder) -> Result<(), HttpClientError> {
        let mut head = format!("{} {} HTTP/1.1\r\n", request.method, request.path);
        if !request.headers.contains("Host") {
            head.push_str(&format!("Host: {}\r\n", self.host_header()));
        }
        for (name, value) in request.headers.iter() {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding") {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if let Some(body) = &request.body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");
        self.stream.write_all(head.as_bytes()).await?;
        if let Some(body) = &request.body {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the response to the last request. `read_timeout` bounds the whole read; `None` waits forever.
    pub async fn read_response(&mut self, read_timeout: Option<Duration>) -> Result<HttpResponse, HttpClientError> {
        let read = read_http_response(&mut self.stream, &mut self.read_buf);
        match read_timeout {
            Some(limit) => timeout(limit, read)
                .await
                .map_err(|_| HttpClientError::from(io::Error::new(io::ErrorKind::TimedOut, "HTTP read timed out")))?,
            None => read.await,
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), HttpClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
