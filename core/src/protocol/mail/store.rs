/*
 * store.rs
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

//! Mailbox and submission abstractions the mail binding is written against.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::mail::message::MailMessage;
use crate::transport::TransportError;

/// Mail store/submission error.
#[derive(Debug, Error)]
pub enum MailError {
    /// The folder connection dropped; the folder may be reopened.
    #[error("folder closed: {0}")]
    FolderClosed(String),
    #[error("mail protocol error: {0}")]
    Protocol(String),
    #[error("mail I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        MailError::Protocol(msg.into())
    }

    pub fn is_folder_closed(&self) -> bool {
        matches!(self, MailError::FolderClosed(_))
    }
}

impl From<MailError> for TransportError {
    fn from(e: MailError) -> Self {
        TransportError::io("mail", e)
    }
}

/// How a folder is opened. Marking or deleting messages needs `ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    All,
    Unseen,
    /// Header `name` contains `value` (case-insensitive, as IMAP SEARCH HEADER).
    Header { name: String, value: String },
}

impl SearchCriteria {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        SearchCriteria::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a message whose Seen flag is `seen`.
    pub fn matches(&self, message: &MailMessage, seen: bool) -> bool {
        match self {
            SearchCriteria::All => true,
            SearchCriteria::Unseen => !seen,
            SearchCriteria::Header { name, value } => {
                let needle = value.to_ascii_lowercase();
                message
                    .headers()
                    .get_all(name)
                    .any(|v| v.to_ascii_lowercase().contains(&needle))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFlag {
    Seen,
    Deleted,
}

/// Stable per-folder message reference (IMAP UID, POP3 UIDL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef(pub String);

/// A message found by a folder search.
#[derive(Debug, Clone)]
pub struct FolderMessage {
    pub id: MessageRef,
    pub message: MailMessage,
}

/// Sends a complete message; one transport session per call.
#[async_trait]
pub trait MailSubmitter: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// A mailbox service from which folders are opened.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Location with any password masked, for logs.
    fn display_name(&self) -> String;

    /// Connect and open the configured folder.
    async fn open_folder(&self, mode: FolderMode) -> Result<Box<dyn MailFolder>, MailError>;
}

/// An open folder. Owned by exactly one user at a time.
#[async_trait]
pub trait MailFolder: Send {
    fn is_open(&self) -> bool;

    fn mode(&self) -> FolderMode;

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<FolderMessage>, MailError>;

    async fn set_flags(&mut self, id: &MessageRef, flags: &[MessageFlag]) -> Result<(), MailError>;

    /// Permanently remove messages flagged deleted.
    async fn expunge(&mut self) -> Result<(), MailError>;

    /// Make newly arrived messages visible.
    async fn refresh(&mut self) -> Result<(), MailError>;

    /// Close the folder and its connection. Idempotent.
    async fn close(&mut self, expunge: bool) -> Result<(), MailError>;
}
