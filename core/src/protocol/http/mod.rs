/*
 * mod.rs
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

//! HTTP binding: HTTP/1.1 client and server framing, plus the sender and
//! receiver connections built on them.
//!
//! - Buffers: `bytes` crate (BytesMut for parse buffer, Bytes for payloads).
//! - HTTP/1.1: state-machine push parser shared by requests and responses.
//! - TLS via rustls with ALPN `http/1.1`.

pub mod client;
pub mod connection;
pub mod h1;
mod receiver;
mod request;
mod response;
mod sender;

pub use client::{HttpClient, HttpClientError};
pub use connection::HttpConnection;
pub use receiver::{
    handle_http_exchange, serve_connection, HttpMessageReceiver, HttpReceiverBinding, HttpReceiverConnection,
};
pub use request::{read_http_request, HttpRequest, Method, RequestBuilder};
pub use response::{read_http_response, standard_reason, write_response, HttpResponse};
pub use sender::{HttpMessageSender, HttpSenderBinding, HttpSenderConnection};
