/*
 * mail_exchange.rs
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

//! Mail exchanges against the in-process mail server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corriere_core::protocol::mail::{
    FolderMessage, FolderMode, MailError, MailFolder, MailMessage, MailMessageReceiver, MailMessageSender, MailStore,
    MailSubmitter, MemoryMailServer, MemoryStore, MessageFlag, MessageRef, PollingMonitoringStrategy, SearchCriteria,
    FAULT_HEADER,
};
use corriere_core::server::{EndpointError, EndpointHandler, MessageEndpoint, MessageHandler};
use corriere_core::transport::{DefaultMessageFactory, Message, MessageClient};
use tokio::time::Instant;

const CLIENT: &str = "client@example.com";
const SERVICE: &str = "svc@example.com";

struct Echo;

#[async_trait]
impl MessageEndpoint for Echo {
    async fn invoke(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        match request.payload().as_ref() {
            b"fail" => Err(EndpointError::Failed("no such product".into())),
            b"boom" => panic!("endpoint crashed"),
            payload => Ok(Some(Message::new(format!("echo:{}", String::from_utf8_lossy(payload))))),
        }
    }
}

/// Store whose folders take `expunge_delay` to expunge.
struct SlowExpungeStore {
    inner: MemoryStore,
    expunge_delay: Duration,
}

#[async_trait]
impl MailStore for SlowExpungeStore {
    fn display_name(&self) -> String {
        self.inner.display_name()
    }

    async fn open_folder(&self, mode: FolderMode) -> Result<Box<dyn MailFolder>, MailError> {
        Ok(Box::new(SlowExpungeFolder {
            inner: self.inner.open_folder(mode).await?,
            delay: self.expunge_delay,
        }))
    }
}

struct SlowExpungeFolder {
    inner: Box<dyn MailFolder>,
    delay: Duration,
}

#[async_trait]
impl MailFolder for SlowExpungeFolder {
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn mode(&self) -> FolderMode {
        self.inner.mode()
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<FolderMessage>, MailError> {
        self.inner.search(criteria).await
    }

    async fn set_flags(&mut self, id: &MessageRef, flags: &[MessageFlag]) -> Result<(), MailError> {
        self.inner.set_flags(id, flags).await
    }

    async fn expunge(&mut self) -> Result<(), MailError> {
        tokio::time::sleep(self.delay).await;
        self.inner.expunge().await
    }

    async fn refresh(&mut self) -> Result<(), MailError> {
        self.inner.refresh().await
    }

    async fn close(&mut self, expunge: bool) -> Result<(), MailError> {
        self.inner.close(expunge).await
    }
}

fn echo_handler() -> Arc<dyn MessageHandler> {
    Arc::new(EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(Echo)))
}

fn client_request(body: &str) -> MailMessage {
    let mut request = MailMessage::new();
    request.set_header("From", CLIENT);
    request.set_header("To", SERVICE);
    request.set_header("Subject", "Order");
    request.set_body(body.as_bytes().to_vec());
    request.prepare_for_send();
    request
}

fn sender(server: &MemoryMailServer) -> MailMessageSender {
    MailMessageSender::new(Arc::new(server.clone()), Arc::new(server.store(CLIENT))).with_from(CLIENT)
}

/// Answers the first request in the service mailbox by hand, after `delay`.
fn reply_later(server: &MemoryMailServer, delay: Duration, bodies: &'static [&'static str]) -> tokio::task::JoinHandle<()> {
    let server = server.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let request = server.mailbox(SERVICE).into_iter().next().expect("request delivered");
        for body in bodies {
            let mut reply = request.reply(Some(SERVICE));
            reply.set_body(body.as_bytes().to_vec());
            reply.prepare_for_send();
            server.send(&reply).await.unwrap();
        }
    })
}

#[tokio::test(start_paused = true)]
async fn reply_within_grace_period() {
    let server = MemoryMailServer::new();
    let responder = reply_later(&server, Duration::from_millis(200), &["pong"]);
    let started = Instant::now();

    let mut conn = sender(&server)
        .with_grace_period(Duration::from_millis(500))
        .open("mailto:svc@example.com?subject=Ping")
        .await
        .unwrap();
    conn.add_request_header("Content-Type", "text/xml").unwrap();
    conn.send(&Message::new("ping")).await.unwrap();
    let request = conn.binding().request_message().cloned().unwrap();
    assert_eq!(request.subject(), Some("Ping"));
    assert_eq!(request.header("From"), Some(CLIENT));
    assert_eq!(request.header("Content-Type"), Some("text/xml"));

    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(reply.payload().as_ref(), b"pong");
    assert_eq!(reply.headers().get("Subject"), Some("Re: Ping"));
    assert!(!conn.has_fault());
    conn.close().await.unwrap();
    responder.await.unwrap();

    // the reply stays in the client mailbox unless deletion was asked for
    assert_eq!(server.mailbox(CLIENT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_replies_first_wins() {
    let server = MemoryMailServer::new();
    let responder = reply_later(&server, Duration::from_millis(100), &["first", "second"]);
    let mut conn = sender(&server)
        .with_grace_period(Duration::from_secs(1))
        .open("mailto:svc@example.com")
        .await
        .unwrap();
    conn.send(&Message::new("once")).await.unwrap();
    let reply = conn.receive(&DefaultMessageFactory).await.unwrap().expect("reply");
    assert_eq!(reply.payload().as_ref(), b"first");
    conn.close().await.unwrap();
    responder.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delete_after_receive_removes_reply() {
    let server = MemoryMailServer::new();
    let responder = reply_later(&server, Duration::from_millis(100), &["done"]);
    let mut conn = sender(&server)
        .with_grace_period(Duration::from_secs(1))
        .with_delete_after_receive(true)
        .open("mailto:svc@example.com")
        .await
        .unwrap();
    conn.send(&Message::new("x")).await.unwrap();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_some());
    conn.close().await.unwrap();
    responder.await.unwrap();
    assert!(server.mailbox(CLIENT).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_is_no_response() {
    let server = MemoryMailServer::new();
    let mut conn = sender(&server)
        .with_grace_period(Duration::from_secs(2))
        .open("mailto:svc@example.com")
        .await
        .unwrap();
    conn.send(&Message::new("hello?")).await.unwrap();
    assert!(conn.receive(&DefaultMessageFactory).await.unwrap().is_none());
    conn.close().await.unwrap();
    assert_eq!(server.mailbox(SERVICE).len(), 1);
}

#[tokio::test]
async fn refused_submission_fails_send() {
    let server = MemoryMailServer::new();
    server.refuse_submissions(true);
    let mut conn = sender(&server).open("mailto:svc@example.com").await.unwrap();
    let err = conn.send(&Message::new("x")).await.unwrap_err();
    assert!(err.is_io());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn receiver_without_reply_address_does_not_answer() {
    let server = MemoryMailServer::new();
    let mut request = MailMessage::new();
    request.set_header("To", SERVICE);
    request.set_body(b"anonymous".to_vec());
    request.prepare_for_send();
    server.deliver(SERVICE, &request);

    let handler: Arc<dyn MessageHandler> =
        Arc::new(EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(Echo)));
    let receiver = MailMessageReceiver::new(
        Arc::new(server.store(SERVICE)),
        Arc::new(server.clone()),
        Box::new(PollingMonitoringStrategy::new(Duration::from_millis(10), true)),
    );
    let handle = receiver.start(handler).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop().await.unwrap();
    assert!(server.sent().is_empty());
    assert!(server.mailbox(SERVICE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn receiver_answers_and_survives_reconnect() {
    let server = MemoryMailServer::new();
    let handler: Arc<dyn MessageHandler> =
        Arc::new(EndpointHandler::new(Arc::new(DefaultMessageFactory), Arc::new(Echo)));
    let handle = MailMessageReceiver::new(
        Arc::new(server.store(SERVICE)),
        Arc::new(server.clone()),
        Box::new(PollingMonitoringStrategy::new(Duration::from_millis(100), true)),
    )
    .with_from(SERVICE)
    .start(handler)
    .await
    .unwrap();
    assert!(handle.is_running());

    let client = MessageClient::new()
        .with_sender(sender(&server).with_grace_period(Duration::from_secs(1)).with_delete_after_receive(true));
    let reply = client
        .send_and_receive("mailto:svc@example.com?subject=Order", &Message::new("order-1"))
        .await
        .unwrap()
        .expect("reply");
    assert_eq!(reply.payload().as_ref(), b"echo:order-1");
    assert_eq!(reply.headers().get("From"), Some(SERVICE));

    server.drop_connections();
    let reply = client
        .send_and_receive("mailto:svc@example.com", &Message::new("order-2"))
        .await
        .unwrap()
        .expect("reply after reconnect");
    assert_eq!(reply.payload().as_ref(), b"echo:order-2");

    let fault = client
        .send_and_receive("mailto:svc@example.com", &Message::new("fail"))
        .await
        .unwrap()
        .expect("fault reply");
    assert!(fault.is_fault());
    assert_eq!(fault.headers().get(FAULT_HEADER), Some("true"));
    assert_eq!(fault.payload().as_ref(), b"no such product");

    handle.stop().await.unwrap();
    // requests were deleted as they were taken
    assert!(server.mailbox(SERVICE).is_empty());
    assert!(server.mailbox(CLIENT).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_poll_still_dispatches_taken_requests() {
    let server = MemoryMailServer::new();
    server.deliver(SERVICE, &client_request("order-9"));
    let store = SlowExpungeStore {
        inner: server.store(SERVICE),
        expunge_delay: Duration::from_millis(50),
    };
    let handle = MailMessageReceiver::new(
        Arc::new(store),
        Arc::new(server.clone()),
        Box::new(PollingMonitoringStrategy::new(Duration::from_millis(10), true)),
    )
    .with_from(SERVICE)
    .start(echo_handler())
    .await
    .unwrap();

    // the first poll is expunging when the stop arrives
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.stop().await.unwrap();

    assert!(server.mailbox(SERVICE).is_empty());
    let replies = server.mailbox(CLIENT);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].body().as_ref(), b"echo:order-9");
}

#[tokio::test(start_paused = true)]
async fn monitor_keeps_dispatching_after_failed_handlers() {
    let server = MemoryMailServer::new();
    let handle = MailMessageReceiver::new(
        Arc::new(server.store(SERVICE)),
        Arc::new(server.clone()),
        Box::new(PollingMonitoringStrategy::new(Duration::from_millis(10), true)),
    )
    .with_from(SERVICE)
    .start(echo_handler())
    .await
    .unwrap();

    // no reply address, then an endpoint panic
    let mut anonymous = MailMessage::new();
    anonymous.set_header("To", SERVICE);
    anonymous.set_body(b"anonymous".to_vec());
    anonymous.prepare_for_send();
    server.deliver(SERVICE, &anonymous);
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.deliver(SERVICE, &client_request("boom"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.deliver(SERVICE, &client_request("order-10"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_running());
    handle.stop().await.unwrap();

    let replies = server.mailbox(CLIENT);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].body().as_ref(), b"echo:order-10");
    assert_eq!(server.sent().len(), 1);
}
