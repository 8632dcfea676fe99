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

//! Mail binding: requests and replies travel as email, replies are found by polling.

pub mod memory;
mod message;
pub mod monitoring;
mod receiver;
mod sender;
mod store;

use std::sync::Arc;

pub use memory::{MemoryMailServer, MemoryStore};
pub use message::{MailMessage, FAULT_HEADER};
pub use monitoring::{default_strategy_for, MonitoringStrategy, Pop3PollingMonitoringStrategy, PollingMonitoringStrategy};
pub use receiver::{MailMessageReceiver, MailReceiverBinding, MailReceiverConnection};
pub use sender::{MailMessageSender, MailSenderBinding, MailSenderConnection};
pub use store::{
    FolderMessage, FolderMode, MailError, MailFolder, MailStore, MailSubmitter, MessageFlag, MessageRef,
    SearchCriteria,
};

use crate::protocol::imap::ImapStore;
use crate::protocol::pop3::Pop3Store;
use crate::protocol::smtp::SmtpSubmitter;
use crate::transport::TransportError;
use crate::uri::{MailProtocol, ServiceUrl};

/// Mailbox store for an `imap`/`pop3` URL.
pub fn store_for(url: &ServiceUrl) -> Result<Arc<dyn MailStore>, TransportError> {
    match url.protocol() {
        MailProtocol::Imap => Ok(Arc::new(ImapStore::new(url.clone())?)),
        MailProtocol::Pop3 => Ok(Arc::new(Pop3Store::new(url.clone())?)),
        MailProtocol::Smtp => Err(TransportError::address(
            url.password_protected(),
            "SMTP is not a mail store protocol",
        )),
    }
}

/// Submitter for an `smtp`/`smtps` URL.
pub fn submitter_for(url: &ServiceUrl) -> Result<Arc<dyn MailSubmitter>, TransportError> {
    Ok(Arc::new(SmtpSubmitter::new(url.clone())?))
}
