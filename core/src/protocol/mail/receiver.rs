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

//! Mail receiver: a long-lived monitor polls a folder and hands each new
//! message to a short-lived task that replies by mail.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::MailSettings;
use crate::protocol::mail::message::{MailMessage, FAULT_HEADER};
use crate::protocol::mail::monitoring::{default_strategy_for, MonitoringStrategy};
use crate::protocol::mail::store::{MailFolder, MailStore, MailSubmitter};
use crate::protocol::mail::{store_for, submitter_for};
use crate::server::{dispatch, MessageHandler, ReceiverHandle};
use crate::transport::{
    InboundConnection, ReceiverBinding, ReceiverConnection, TransportError, TransportKind, WireMessage,
};
use crate::uri::ServiceUrl;

pub type MailReceiverConnection = ReceiverConnection<MailReceiverBinding>;

/// Receiver-side mail binding around one request message.
pub struct MailReceiverBinding {
    original: MailMessage,
    request: WireMessage,
    from: Option<String>,
    submitter: Arc<dyn MailSubmitter>,
    reply: Option<MailMessage>,
}

impl MailReceiverBinding {
    pub fn new(original: MailMessage, from: Option<String>, submitter: Arc<dyn MailSubmitter>) -> Self {
        let request = WireMessage::new(original.headers().clone(), original.body().clone(), original.is_fault());
        Self {
            original,
            request,
            from,
            submitter,
            reply: None,
        }
    }

    pub fn request_message(&self) -> &MailMessage {
        &self.original
    }

    /// The reply as composed, once written.
    pub fn reply_message(&self) -> Option<&MailMessage> {
        self.reply.as_ref()
    }
}

#[async_trait]
impl ReceiverBinding for MailReceiverBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Mail
    }

    fn request(&self) -> &WireMessage {
        &self.request
    }

    async fn prepare_reply(&mut self, reply: WireMessage) -> Result<(), TransportError> {
        let mut message = self.original.reply(self.from.as_deref());
        if message.recipients().is_empty() {
            return Err(TransportError::io(
                "compose reply mail",
                "request carries neither Reply-To nor From",
            ));
        }
        for (name, value) in reply.headers.iter() {
            message.add_header(name, value);
        }
        if reply.fault {
            message.set_header(FAULT_HEADER, "true");
        }
        message.set_body(reply.body);
        message.prepare_for_send();
        self.reply = Some(message);
        Ok(())
    }

    async fn flush_reply(&mut self) -> Result<bool, TransportError> {
        let reply = self
            .reply
            .as_ref()
            .ok_or_else(|| TransportError::IllegalState("no reply prepared".to_string()))?;
        self.submitter
            .send(reply)
            .await
            .map_err(|e| TransportError::io("send reply mail", e))?;
        debug!(in_reply_to = ?self.original.message_id(), "reply mail sent");
        Ok(true)
    }

    async fn release(&mut self, _replied: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Polls a mailbox for requests and answers them through `MessageHandler`.
pub struct MailMessageReceiver {
    store: Arc<dyn MailStore>,
    submitter: Arc<dyn MailSubmitter>,
    strategy: Box<dyn MonitoringStrategy>,
    from: Option<String>,
}

impl MailMessageReceiver {
    pub fn new(
        store: Arc<dyn MailStore>,
        submitter: Arc<dyn MailSubmitter>,
        strategy: Box<dyn MonitoringStrategy>,
    ) -> Self {
        Self {
            store,
            submitter,
            strategy,
            from: None,
        }
    }

    /// Store and transport from settings; the strategy follows the store protocol.
    pub fn from_settings(settings: &MailSettings) -> Result<Self, TransportError> {
        let store_uri = settings
            .store_uri
            .as_deref()
            .ok_or_else(|| TransportError::address("", "mail store URI is required"))?;
        let transport_uri = settings
            .transport_uri
            .as_deref()
            .ok_or_else(|| TransportError::address("", "mail transport URI is required"))?;
        let store_url = ServiceUrl::parse(store_uri)?;
        let strategy = default_strategy_for(&store_url, settings)?;
        let mut receiver = Self::new(
            store_for(&store_url)?,
            submitter_for(&ServiceUrl::parse(transport_uri)?)?,
            strategy,
        );
        receiver.from = settings.from.clone();
        Ok(receiver)
    }

    /// From address of replies.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Open the folder and start monitoring. A folder that cannot be opened
    /// fails here; nothing is spawned.
    pub async fn start(self, handler: Arc<dyn MessageHandler>) -> Result<ReceiverHandle, TransportError> {
        let name = self.store.display_name();
        let folder = self.store.open_folder(self.strategy.folder_mode()).await?;
        info!(store = %name, "starting mail receiver");
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(monitor(self, folder, handler, stop_rx));
        Ok(ReceiverHandle::new(name, stop_tx, task))
    }
}

async fn monitor(
    receiver: MailMessageReceiver,
    mut folder: Box<dyn MailFolder>,
    handler: Arc<dyn MessageHandler>,
    mut stop: watch::Receiver<bool>,
) {
    let MailMessageReceiver {
        store,
        submitter,
        mut strategy,
        from,
    } = receiver;
    let name = store.display_name();
    let mut handlers = JoinSet::new();

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = stop.changed() => break,
            _ = strategy.wait() => {}
        }
        // fetched messages are already marked taken; dispatch them even if stop arrives meanwhile
        let polled = strategy.fetch(folder.as_mut()).await;
        match polled {
            Ok(messages) => {
                for message in messages {
                    let binding = MailReceiverBinding::new(message, from.clone(), Arc::clone(&submitter));
                    let handler = Arc::clone(&handler);
                    handlers.spawn(async move {
                        let mut connection = InboundConnection::Mail(ReceiverConnection::new(binding));
                        if let Err(e) = dispatch(handler.as_ref(), &mut connection).await {
                            error!(error = %e, "could not handle incoming mail connection");
                        }
                    });
                }
            }
            Err(e) if e.is_folder_closed() => {
                info!(store = %name, "folder closed, reopening");
                if *stop.borrow() {
                    break;
                }
                match store.open_folder(strategy.folder_mode()).await {
                    Ok(reopened) => folder = reopened,
                    Err(e) => {
                        error!(store = %name, error = %e, "could not reopen folder; mail receiver stops");
                        break;
                    }
                }
            }
            Err(e) => warn!(store = %name, error = %e, "polling for new mail failed"),
        }
        while let Some(done) = handlers.try_join_next() {
            if let Err(e) = done {
                error!(error = %e, "mail handler task failed");
            }
        }
    }

    info!(store = %name, "stopping mail receiver");
    if let Err(e) = folder.close(true).await {
        warn!(store = %name, error = %e, "failed to close monitored folder");
    }
    while let Some(done) = handlers.join_next().await {
        if let Err(e) = done {
            error!(error = %e, "mail handler task failed");
        }
    }
}
