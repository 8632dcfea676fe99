/*
 * http_exchange.rs
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

//! HTTP exchanges over loopback TCP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corriere_core::protocol::http::{HttpMessageReceiver, HttpMessageSender};
use corriere_core::server::{EndpointError, EndpointHandler, MessageEndpoint, MessageHandler, ReceiverHandle};
use corriere_core::transport::{DefaultMessageFactory, ExchangeState, Message, MessageClient, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Replies `echo:<payload>`, echoes SOAPAction, fails on `fail` and knows
/// nothing about `missing`.
struct Echo;

#[async_trait]
impl MessageEndpoint for Echo {
    async fn invoke(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        match request.payload().as_ref() {
            b"fail" => Err(EndpointError::Failed("bad order".into())),
            b"missing" => Err(EndpointError::NotFound),
            b"notify" => Ok(None),
            payload => {
                let mut reply = Message::new(format!("echo:{}", String::from_utf8_lossy(payload)));
                if let Some(action) = request.headers().get("SOAPAction") {
                    reply.headers_mut().add("SOAPAction", action);
                }
                Ok(Some(reply))
            }
        }
    }
}

async fn start_server() -> (String, ReceiverHandle) {
    let receiver = HttpMessageReceiver::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver.local_addr().unwrap();
    let handler: Arc<dyn MessageHandler> =
        Arc::new(EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(Echo)));
    let handle = receiver.start(handler).unwrap();
    (format!("http://{}/services/orders", addr), handle)
}

/// Reads one request head and its Content-Length body from `stream`.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed early");
        data.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return text;
            }
        }
    }
}

#[tokio::test]
async fn accepted_status_is_no_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        request
    });

    let sender = HttpMessageSender::default();
    let mut conn = sender.open(&format!("http://{}/notify", addr)).await.unwrap();
    conn.add_request_header("Content-Type", "text/xml; charset=utf-8").unwrap();
    conn.send(&Message::new("<ping/>")).await.unwrap();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_none());
    assert!(!conn.has_error());
    assert!(!conn.has_fault());
    conn.close().await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /notify HTTP/1.1\r\n"));
    assert!(request.contains("Content-Type: text/xml; charset=utf-8\r\n"));
    assert!(request.ends_with("<ping/>"));
}

#[tokio::test]
async fn round_trip_through_receiver() {
    let (uri, handle) = start_server().await;
    let sender = HttpMessageSender::default();
    let mut conn = sender.open(&uri).await.unwrap();
    conn.add_request_header("SOAPAction", "urn:place").unwrap();
    conn.send(&Message::new("order-1")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:order-1");
    assert_eq!(reply.headers().get("SOAPAction"), Some("urn:place"));
    assert_eq!(conn.binding().status(), Some((200, "OK")));
    assert_eq!(conn.state(), ExchangeState::Complete);
    conn.close().await.unwrap();
    assert_eq!(conn.state(), ExchangeState::Closed);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn endpoint_failure_is_a_500_fault() {
    let (uri, handle) = start_server().await;
    let mut conn = HttpMessageSender::default().open(&uri).await.unwrap();
    conn.send(&Message::new("fail")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("fault");
    assert!(conn.has_fault());
    assert!(reply.is_fault());
    assert_eq!(reply.payload().as_ref(), b"bad order");
    conn.close().await.unwrap();

    // a fault is still an answer to the client
    let client = MessageClient::new().with_sender(HttpMessageSender::default());
    let reply = client
        .send_and_receive(&uri, &Message::new("fail"))
        .await
        .unwrap()
        .expect("fault");
    assert!(reply.is_fault());
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_endpoint_is_404() {
    let (uri, handle) = start_server().await;
    let mut conn = HttpMessageSender::default().open(&uri).await.unwrap();
    conn.send(&Message::new("missing")).await.unwrap();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_none());
    assert!(conn.has_error());
    assert_eq!(conn.error_message().as_deref(), Some("404 Not Found"));
    conn.close().await.unwrap();

    let client = MessageClient::new().with_sender(HttpMessageSender::default());
    let err = client
        .send_and_receive(&uri, &Message::new("missing"))
        .await
        .unwrap_err();
    assert!(err.is_io());
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn one_way_request_is_202() {
    let (uri, handle) = start_server().await;
    let mut conn = HttpMessageSender::default().open(&uri).await.unwrap();
    conn.send(&Message::new("notify")).await.unwrap();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_none());
    assert_eq!(conn.binding().status(), Some((202, "Accepted")));
    conn.close().await.unwrap();
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn get_is_not_allowed() {
    let (uri, handle) = start_server().await;
    let addr = uri.trim_start_matches("http://").split('/').next().unwrap().to_string();
    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET /services/orders HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 405 "));
    assert!(response.contains("Allow: POST\r\n"));
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        // hold the connection open without answering
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let sender = HttpMessageSender::default().with_read_timeout(Some(Duration::from_millis(200)));
    let mut conn = sender.open(&format!("http://{}/slow", addr)).await.unwrap();
    conn.send(&Message::new("anyone?")).await.unwrap();
    let err = conn.receive(&DefaultMessageFactory).await.unwrap_err();
    assert!(err.is_io());
    conn.close().await.unwrap();
    server.abort();
}

#[tokio::test]
async fn unsupported_scheme_is_an_address_error() {
    let err = HttpMessageSender::default().open("jms:Orders").await.err().unwrap();
    assert!(matches!(err, TransportError::Address { .. }));
}
