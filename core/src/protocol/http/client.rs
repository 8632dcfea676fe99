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

//! HTTP client: connect to a host, then use the connection to send requests.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::net::{NetStream, TlsProfile};
use crate::protocol::http::connection::HttpConnection;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpClientError {
    pub message: String,
    /// Underlying I/O error kind when the failure was a socket error.
    pub io_kind: Option<io::ErrorKind>,
}

impl HttpClientError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            io_kind: None,
        }
    }
}

impl From<io::Error> for HttpClientError {
    fn from(e: io::Error) -> Self {
        Self {
            message: e.to_string(),
            io_kind: Some(e.kind()),
        }
    }
}

/// Create with `HttpClient::connect(host, port, use_tls, timeout)`.
pub struct HttpClient;

impl HttpClient {
    /// Connect to the given host and port; `use_tls` handshakes with ALPN `http/1.1`.
    pub async fn connect(
        host: &str,
        port: u16,
        use_tls: bool,
        connect_timeout: Duration,
    ) -> Result<HttpConnection, HttpClientError> {
        let stream = NetStream::connect(host, port, use_tls, TlsProfile::Http, connect_timeout).await?;
        Ok(HttpConnection::new(stream, host.to_string(), port, use_tls))
    }
}
