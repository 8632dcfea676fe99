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

//! SMTP submission: one connection per message.

mod client;
pub mod dot_stuffer;

pub use client::{send_message_async, SmtpClientError, SmtpEnvelope, SmtpOptions, SmtpSession};

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::mime::mailbox_address;
use crate::protocol::mail::{MailError, MailMessage, MailSubmitter};
use crate::uri::{MailProtocol, ServiceUrl};
use crate::transport::TransportError;

impl From<SmtpClientError> for MailError {
    fn from(e: SmtpClientError) -> Self {
        match e.io_kind {
            Some(kind) => MailError::Io(std::io::Error::new(kind, e.message)),
            None => MailError::Protocol(e.message),
        }
    }
}

/// Submits mail through an SMTP server named by a transport URL
/// (`smtp://[user[:password]@]host[:port]`, `smtps://...`).
///
/// No connection is held between messages: each `send` connects, submits
/// and quits.
#[derive(Clone)]
pub struct SmtpSubmitter {
    url: ServiceUrl,
    options: SmtpOptions,
}

impl SmtpSubmitter {
    pub fn new(url: ServiceUrl) -> Result<Self, TransportError> {
        if url.protocol() != MailProtocol::Smtp {
            return Err(TransportError::address(
                url.password_protected(),
                "not an SMTP transport URL",
            ));
        }
        let mut options = SmtpOptions::new(url.host(), url.port());
        options.implicit_tls = url.implicit_tls();
        options.starttls = url.starttls();
        if let Some(user) = url.user() {
            options.credentials = Some((user.to_string(), url.password().unwrap_or("").to_string()));
        }
        if let Some(name) = url.param("ehlo") {
            options.ehlo_hostname = name.to_string();
        }
        Ok(Self { url, options })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.url
    }
}

#[async_trait]
impl MailSubmitter for SmtpSubmitter {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let from = message
            .header("Sender")
            .or_else(|| message.header("From"))
            .and_then(mailbox_address)
            .unwrap_or_default();
        let envelope = SmtpEnvelope {
            from,
            recipients: message.recipients(),
        };
        debug!(
            transport = %self.url.password_protected(),
            recipients = envelope.recipients.len(),
            "submitting message"
        );
        send_message_async(&self.options, &envelope, &message.to_rfc822()).await?;
        Ok(())
    }
}
