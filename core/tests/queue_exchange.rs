/*
 * queue_exchange.rs
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

//! Queue exchanges against the in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corriere_core::protocol::http::HttpMessageSender;
use corriere_core::protocol::queue::{
    handle_message, Broker, Destination, MemoryBroker, QueueBody, QueueMessage, QueueMessageReceiver,
    QueueMessageSender, QueueReceiverBinding, QueueReceiverConnection, SendOptions,
};
use corriere_core::server::{EndpointError, EndpointHandler, MessageEndpoint, MessageHandler, ReceiverHandle};
use corriere_core::transport::{DefaultMessageFactory, ExchangeState, Message, MessageClient, TransportError};
use tokio::time::Instant;

/// Replies `echo:<payload>` and echoes SOAPAction.
struct Echo;

#[async_trait]
impl MessageEndpoint for Echo {
    async fn invoke(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        let mut reply = Message::new(format!("echo:{}", String::from_utf8_lossy(request.payload())));
        if let Some(action) = request.headers().get("SOAPAction") {
            reply.headers_mut().add("SOAPAction", action);
        }
        Ok(Some(reply))
    }
}

struct Failing;

#[async_trait]
impl MessageEndpoint for Failing {
    async fn invoke(&self, _request: Message) -> Result<Option<Message>, EndpointError> {
        Err(EndpointError::Failed("out of stock".into()))
    }
}

fn handler(endpoint: impl MessageEndpoint + 'static) -> Arc<dyn MessageHandler> {
    Arc::new(EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(endpoint)))
}

async fn responder(broker: &Arc<dyn Broker>, queue: &str, endpoint: impl MessageEndpoint + 'static) -> ReceiverHandle {
    QueueMessageReceiver::new(Arc::clone(broker), queue)
        .start(handler(endpoint))
        .await
        .unwrap()
}

#[tokio::test]
async fn temporary_reply_queue_is_deleted_on_close() {
    let broker = MemoryBroker::new();
    let shared: Arc<dyn Broker> = Arc::new(broker.clone());
    let receiver = responder(&shared, "Orders", Echo).await;
    let sender = QueueMessageSender::new(Arc::clone(&shared)).with_receive_timeout(Some(Duration::from_secs(5)));

    let mut conn = sender.open("queue:Orders?deliveryMode=1").await.unwrap();
    conn.add_request_header("SOAPAction", "urn:order").unwrap();
    conn.send(&Message::new("order-1")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:order-1");
    assert_eq!(reply.headers().get("SOAPAction"), Some("urn:order"));
    assert!(!conn.has_fault());

    let temp = conn.binding().reply_destination().cloned().unwrap();
    assert!(temp.is_temporary());
    assert!(broker.queue_exists(temp.name()));
    conn.close().await.unwrap();
    assert!(!broker.queue_exists(temp.name()));
    conn.close().await.unwrap();

    receiver.stop().await.unwrap();
}

#[tokio::test]
async fn named_reply_queue_selects_by_correlation_id() {
    let broker = MemoryBroker::new();
    let shared: Arc<dyn Broker> = Arc::new(broker.clone());

    // someone else's reply is already waiting on the shared queue
    let mut session = broker.create_session().await.unwrap();
    let replies = session.resolve("Replies", false).await.unwrap();
    let mut producer = session.create_producer(&replies).await.unwrap();
    let mut stray = QueueMessage::new(QueueBody::Text("stray".into()));
    stray.correlation_id = Some("ID:999999".into());
    producer.send(stray, &SendOptions::default()).await.unwrap();

    let receiver = responder(&shared, "Orders", Echo).await;
    let sender = QueueMessageSender::new(Arc::clone(&shared)).with_receive_timeout(Some(Duration::from_secs(5)));
    let mut conn = sender.open("jms:Orders?replyToName=Replies").await.unwrap();
    conn.send(&Message::new("order-2")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:order-2");
    assert_eq!(
        conn.binding().reply_destination(),
        Some(&Destination::Queue("Replies".into()))
    );
    conn.close().await.unwrap();

    assert!(broker.queue_exists("Replies"));
    assert_eq!(broker.queue_depth("Replies"), 1);
    receiver.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_is_no_response() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let sender = QueueMessageSender::new(shared).with_receive_timeout(Some(Duration::from_secs(2)));
    let mut conn = sender.open("jms:Nobody").await.unwrap();
    conn.send(&Message::new("hello?")).await.unwrap();
    let started = Instant::now();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(conn.state(), ExchangeState::Complete);
    conn.close().await.unwrap();
    assert_eq!(conn.state(), ExchangeState::Closed);
}

#[tokio::test]
async fn duplicate_replies_first_wins() {
    let broker = MemoryBroker::new();
    let shared: Arc<dyn Broker> = Arc::new(broker.clone());
    let mut session = broker.create_session().await.unwrap();
    let orders = session.resolve("Orders", false).await.unwrap();
    let mut consumer = session.create_consumer(&orders, None).await.unwrap();
    let replier = tokio::spawn(async move {
        let request = consumer
            .receive(Some(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        let reply_to = request.reply_to.clone().unwrap();
        let mut producer = session.create_producer(&reply_to).await.unwrap();
        for body in ["first", "second"] {
            let mut reply = QueueMessage::new(QueueBody::Text(body.into()));
            reply.correlation_id = request.message_id.clone();
            producer.send(reply, &SendOptions::default()).await.unwrap();
        }
    });

    let sender = QueueMessageSender::new(shared).with_receive_timeout(Some(Duration::from_secs(5)));
    let mut conn = sender.open("jms:Orders?replyToName=Replies").await.unwrap();
    conn.send(&Message::new("once")).await.unwrap();
    replier.await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"first");
    conn.close().await.unwrap();
    assert_eq!(broker.queue_depth("Replies"), 0);
}

#[tokio::test]
async fn endpoint_failure_comes_back_as_fault() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let receiver = responder(&shared, "Orders", Failing).await;
    let sender = QueueMessageSender::new(Arc::clone(&shared)).with_receive_timeout(Some(Duration::from_secs(5)));
    let mut conn = sender.open("jms:Orders?messageType=TEXT_MESSAGE").await.unwrap();
    conn.send(&Message::new("order-3")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("fault reply");
    assert!(conn.has_fault());
    assert!(reply.is_fault());
    assert_eq!(reply.payload().as_ref(), b"out of stock");
    conn.close().await.unwrap();
    receiver.stop().await.unwrap();
}

#[tokio::test]
async fn topic_request_reaches_subscriber() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let receiver = QueueMessageReceiver::new(Arc::clone(&shared), "Prices")
        .with_pub_sub(true)
        .start(handler(Echo))
        .await
        .unwrap();
    let sender = QueueMessageSender::new(Arc::clone(&shared)).with_receive_timeout(Some(Duration::from_secs(5)));
    let mut conn = sender.open("jms:Prices?destinationType=topic").await.unwrap();
    assert_eq!(conn.binding().destination(), &Destination::Topic("Prices".into()));
    conn.send(&Message::new("quote")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:quote");
    conn.close().await.unwrap();
    receiver.stop().await.unwrap();
}

#[tokio::test]
async fn inbound_without_reply_to_is_not_answered() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let mut request = QueueMessage::new(QueueBody::Text("one-way".into()));
    request.message_id = Some("ID:1".into());
    let mut conn = QueueReceiverConnection::new(QueueReceiverBinding::new(shared, request).unwrap());
    let received = conn.receive(&DefaultMessageFactory).unwrap();
    assert_eq!(received.payload().as_ref(), b"one-way");
    conn.send(&Message::new("nobody listens")).await.unwrap();
    assert!(conn.binding().reply_message().is_none());
    assert!(!conn.has_replied());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn inbound_with_reply_to_is_answered() {
    let broker = MemoryBroker::new();
    let shared: Arc<dyn Broker> = Arc::new(broker.clone());
    let mut session = broker.create_session().await.unwrap();
    let answers = session.resolve("Answers", false).await.unwrap();
    let mut request = QueueMessage::new(QueueBody::Bytes("ask".into()));
    request.message_id = Some("ID:7".into());
    request.reply_to = Some(answers);
    let mut conn = QueueReceiverConnection::new(QueueReceiverBinding::new(shared, request).unwrap());
    conn.send(&Message::new("answer")).await.unwrap();
    assert!(conn.has_replied());
    assert_eq!(
        conn.binding().reply_message().and_then(|m| m.correlation_id.as_deref()),
        Some("ID:7")
    );
    conn.close().await.unwrap();
    assert_eq!(broker.queue_depth("Answers"), 1);
}

#[tokio::test]
async fn map_message_is_rejected() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let message = QueueMessage::new(QueueBody::Map(vec![("k".into(), "v".into())]));
    let endpoint = EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(Echo));
    let err = handle_message(shared, message, &endpoint).await.unwrap_err();
    assert!(matches!(err, TransportError::UnsupportedPayload(_)));
}

#[tokio::test]
async fn client_picks_the_sender_by_scheme() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let receiver = responder(&shared, "Orders", Echo).await;
    let client = MessageClient::new()
        .with_sender(HttpMessageSender::default())
        .with_sender(QueueMessageSender::new(Arc::clone(&shared)).with_receive_timeout(Some(Duration::from_secs(5))));
    let reply = client
        .send_and_receive("jms:Orders", &Message::new("x"))
        .await
        .unwrap()
        .expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:x");

    let err = client
        .send_and_receive("ftp://files.example.com/x", &Message::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Address { .. }));
    receiver.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_uri_fails_at_open() {
    let shared: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let sender = QueueMessageSender::new(shared);
    let err = sender.open("jms:Orders?priority=high").await.err().unwrap();
    assert!(matches!(err, TransportError::Address { .. }));
}
