/*
 * monitoring.rs
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

//! Monitoring strategies: how the mail receiver waits for and recognises new requests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::MailSettings;
use crate::protocol::mail::message::MailMessage;
use crate::protocol::mail::store::{FolderMode, MailError, MailFolder, MessageFlag, MessageRef, SearchCriteria};
use crate::transport::TransportError;
use crate::uri::{MailProtocol, ServiceUrl};

/// Waits for new mail in a folder and returns it.
#[async_trait]
pub trait MonitoringStrategy: Send {
    /// Mode the monitored folder must be opened in.
    fn folder_mode(&self) -> FolderMode;

    /// Block until the next poll is due. Safe to abandon.
    async fn wait(&mut self);

    /// Return the messages that are new since the previous fetch. They are
    /// marked as taken before this returns, so the caller must dispatch every
    /// one of them. `MailError::FolderClosed` asks the caller to reopen.
    async fn fetch(&mut self, folder: &mut dyn MailFolder) -> Result<Vec<MailMessage>, MailError>;

    /// `wait`, then `fetch`.
    async fn monitor(&mut self, folder: &mut dyn MailFolder) -> Result<Vec<MailMessage>, MailError> {
        self.wait().await;
        self.fetch(folder).await
    }
}

/// IMAP polling: sleep, NOOP, search UNSEEN.
///
/// In read-write mode found messages are flagged `\Seen` (and `\Deleted`
/// plus expunged when deleting). A read-only folder cannot be flagged, so
/// already dispatched messages are remembered instead.
pub struct PollingMonitoringStrategy {
    poll_interval: Duration,
    delete_messages: bool,
    dispatched: HashSet<MessageRef>,
}

impl PollingMonitoringStrategy {
    pub fn new(poll_interval: Duration, delete_messages: bool) -> Self {
        Self {
            poll_interval,
            delete_messages,
            dispatched: HashSet::new(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[async_trait]
impl MonitoringStrategy for PollingMonitoringStrategy {
    fn folder_mode(&self) -> FolderMode {
        if self.delete_messages {
            FolderMode::ReadWrite
        } else {
            FolderMode::ReadOnly
        }
    }

    async fn wait(&mut self) {
        tokio::time::sleep(self.poll_interval).await;
    }

    async fn fetch(&mut self, folder: &mut dyn MailFolder) -> Result<Vec<MailMessage>, MailError> {
        if !folder.is_open() {
            return Err(MailError::FolderClosed("monitored folder is closed".to_string()));
        }
        folder.refresh().await?;
        let found = folder.search(&SearchCriteria::Unseen).await?;
        let writable = folder.mode() == FolderMode::ReadWrite;
        if !writable {
            self.dispatched.retain(|id| found.iter().any(|m| &m.id == id));
        }
        let mut messages = Vec::with_capacity(found.len());
        for m in found {
            if writable {
                let flags: &[MessageFlag] = if self.delete_messages {
                    &[MessageFlag::Seen, MessageFlag::Deleted]
                } else {
                    &[MessageFlag::Seen]
                };
                folder.set_flags(&m.id, flags).await?;
            } else if !self.dispatched.insert(m.id.clone()) {
                continue;
            }
            messages.push(m.message);
        }
        if writable && self.delete_messages && !messages.is_empty() {
            folder.expunge().await?;
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), "new messages found");
        }
        Ok(messages)
    }
}

/// POP3 polling: every poll reopens the maildrop (committing earlier
/// deletions) and takes every message on it. Retrieved messages are
/// always deleted, since POP3 keeps no seen state.
pub struct Pop3PollingMonitoringStrategy {
    poll_interval: Duration,
}

impl Pop3PollingMonitoringStrategy {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl MonitoringStrategy for Pop3PollingMonitoringStrategy {
    fn folder_mode(&self) -> FolderMode {
        FolderMode::ReadWrite
    }

    async fn wait(&mut self) {
        tokio::time::sleep(self.poll_interval).await;
    }

    async fn fetch(&mut self, folder: &mut dyn MailFolder) -> Result<Vec<MailMessage>, MailError> {
        if !folder.is_open() {
            return Err(MailError::FolderClosed("maildrop is closed".to_string()));
        }
        folder.refresh().await?;
        let found = folder.search(&SearchCriteria::All).await?;
        let mut messages = Vec::with_capacity(found.len());
        for m in found {
            folder.set_flags(&m.id, &[MessageFlag::Deleted]).await?;
            messages.push(m.message);
        }
        Ok(messages)
    }
}

/// Strategy matching the store protocol: IMAP polls UNSEEN, POP3 drains the maildrop.
pub fn default_strategy_for(
    store: &ServiceUrl,
    settings: &MailSettings,
) -> Result<Box<dyn MonitoringStrategy>, TransportError> {
    match store.protocol() {
        MailProtocol::Imap => Ok(Box::new(PollingMonitoringStrategy::new(
            settings.poll_interval,
            settings.delete_messages,
        ))),
        MailProtocol::Pop3 => Ok(Box::new(Pop3PollingMonitoringStrategy::new(settings.poll_interval))),
        MailProtocol::Smtp => Err(TransportError::address(
            store.password_protected(),
            format!(
                "cannot determine monitoring strategy for \"{}\"; set one explicitly",
                store.scheme()
            ),
        )),
    }
}
