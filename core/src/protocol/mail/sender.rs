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

//! Mail sender: send the request, sleep the grace period, then poll the
//! reply mailbox for a message whose In-Reply-To names the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::MailSettings;
use crate::message_id::CorrelationToken;
use crate::protocol::mail::message::MailMessage;
use crate::protocol::mail::store::{FolderMode, MailFolder, MailStore, MailSubmitter, MessageFlag, SearchCriteria};
use crate::protocol::mail::{store_for, submitter_for};
use crate::transport::{
    SenderBinding, SenderConnection, TransportError, TransportHeaders, TransportKind, WireMessage,
};
use crate::uri::{MailtoUri, ServiceUrl};

pub type MailSenderConnection = SenderConnection<MailSenderBinding>;

/// Sender-side mail binding for one exchange.
pub struct MailSenderBinding {
    to: MailtoUri,
    from: Option<String>,
    submitter: Arc<dyn MailSubmitter>,
    store: Arc<dyn MailStore>,
    grace_period: Duration,
    delete_after_receive: bool,
    request: Option<MailMessage>,
    request_id: Option<CorrelationToken>,
    folder: Option<Box<dyn MailFolder>>,
}

impl MailSenderBinding {
    /// The request as sent, once `send` has run.
    pub fn request_message(&self) -> Option<&MailMessage> {
        self.request.as_ref()
    }

    /// Message-ID of the request, the correlation token for the reply.
    pub fn request_id(&self) -> Option<&CorrelationToken> {
        self.request_id.as_ref()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    async fn find_reply(&mut self, token: &CorrelationToken) -> Result<Option<MailMessage>, TransportError> {
        let mode = if self.delete_after_receive {
            FolderMode::ReadWrite
        } else {
            FolderMode::ReadOnly
        };
        let folder = self.store.open_folder(mode).await?;
        let folder = self.folder.insert(folder);
        let criteria = SearchCriteria::header("In-Reply-To", token.as_str());
        let mut replies: Vec<_> = folder
            .search(&criteria)
            .await?
            .into_iter()
            .filter(|m| m.message.in_reply_to().iter().any(|id| token.matches(id)))
            .collect();
        if replies.len() > 1 {
            warn!(
                message_id = %token,
                count = replies.len(),
                "received more than one response for request; using the first"
            );
        }
        if replies.is_empty() {
            return Ok(None);
        }
        let reply = replies.swap_remove(0);
        if self.delete_after_receive {
            folder.set_flags(&reply.id, &[MessageFlag::Deleted]).await?;
        }
        Ok(Some(reply.message))
    }
}

#[async_trait]
impl SenderBinding for MailSenderBinding {
    fn kind(&self) -> TransportKind {
        TransportKind::Mail
    }

    fn uri(&self) -> String {
        self.to.to_string()
    }

    async fn prepare_request(&mut self, headers: &TransportHeaders, body: Bytes) -> Result<(), TransportError> {
        let mut message = MailMessage::new();
        message.set_header("To", self.to.address());
        if let Some(from) = &self.from {
            message.set_header("From", from);
        }
        if let Some(subject) = self.to.subject() {
            message.set_header("Subject", subject);
        }
        for (name, value) in headers.iter() {
            message.add_header(name, value);
        }
        message.set_body(body);
        let id = message.prepare_for_send();
        self.request_id = Some(CorrelationToken::new(id));
        self.request = Some(message);
        Ok(())
    }

    async fn publish(&mut self) -> Result<(), TransportError> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| TransportError::IllegalState("no request prepared".to_string()))?;
        self.submitter
            .send(request)
            .await
            .map_err(|e| TransportError::io("send request mail", e))?;
        debug!(to = %self.to.address(), message_id = ?self.request_id, "request mail sent");
        Ok(())
    }

    async fn await_reply(&mut self) -> Result<Option<WireMessage>, TransportError> {
        let token = self
            .request_id
            .clone()
            .ok_or_else(|| TransportError::IllegalState("request has no Message-ID".to_string()))?;
        // no delivery signal exists for mail; wait out the grace period, then poll once
        tokio::time::sleep(self.grace_period).await;
        let Some(reply) = self.find_reply(&token).await? else {
            return Ok(None);
        };
        Ok(Some(WireMessage::new(
            reply.headers().clone(),
            reply.body().clone(),
            reply.is_fault(),
        )))
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        if let Some(mut folder) = self.folder.take() {
            folder.close(self.delete_after_receive).await?;
        }
        Ok(())
    }
}

/// Opens mail exchanges for `mailto:` URIs.
#[derive(Clone)]
pub struct MailMessageSender {
    from: Option<String>,
    submitter: Arc<dyn MailSubmitter>,
    store: Arc<dyn MailStore>,
    grace_period: Duration,
    delete_after_receive: bool,
}

impl MailMessageSender {
    pub fn new(submitter: Arc<dyn MailSubmitter>, store: Arc<dyn MailStore>) -> Self {
        let defaults = MailSettings::default();
        Self {
            from: None,
            submitter,
            store,
            grace_period: defaults.grace_period,
            delete_after_receive: defaults.delete_after_receive,
        }
    }

    /// Build from settings; `store_uri` and `transport_uri` are required.
    pub fn from_settings(settings: &MailSettings) -> Result<Self, TransportError> {
        let store_uri = settings
            .store_uri
            .as_deref()
            .ok_or_else(|| TransportError::address("", "mail store URI is required"))?;
        let transport_uri = settings
            .transport_uri
            .as_deref()
            .ok_or_else(|| TransportError::address("", "mail transport URI is required"))?;
        let store = store_for(&ServiceUrl::parse(store_uri)?)?;
        let submitter = submitter_for(&ServiceUrl::parse(transport_uri)?)?;
        let mut sender = Self::new(submitter, store)
            .with_grace_period(settings.grace_period)
            .with_delete_after_receive(settings.delete_after_receive);
        sender.from = settings.from.clone();
        Ok(sender)
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_delete_after_receive(mut self, delete: bool) -> Self {
        self.delete_after_receive = delete;
        self
    }

    pub fn supports(&self, uri: &str) -> bool {
        uri.get(..7).is_some_and(|s| s.eq_ignore_ascii_case("mailto:"))
    }

    /// Validate the destination. Nothing is opened until the reply is awaited.
    pub async fn open(&self, uri: &str) -> Result<MailSenderConnection, TransportError> {
        let to = MailtoUri::parse(uri)?;
        Ok(SenderConnection::new(MailSenderBinding {
            to,
            from: self.from.clone(),
            submitter: Arc::clone(&self.submitter),
            store: Arc::clone(&self.store),
            grace_period: self.grace_period,
            delete_after_receive: self.delete_after_receive,
            request: None,
            request_id: None,
            folder: None,
        }))
    }
}
