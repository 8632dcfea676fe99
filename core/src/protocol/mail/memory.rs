/*
 * memory.rs
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

//! In-process mail server: SMTP-like submission into per-address mailboxes
//! and IMAP-like folders over them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::protocol::mail::message::MailMessage;
use crate::protocol::mail::store::{
    FolderMessage, FolderMode, MailError, MailFolder, MailStore, MailSubmitter, MessageFlag, MessageRef,
    SearchCriteria,
};

struct Stored {
    uid: u64,
    raw: Vec<u8>,
    seen: bool,
    deleted: bool,
}

#[derive(Default)]
struct ServerState {
    mailboxes: HashMap<String, Vec<Stored>>,
    sent: Vec<MailMessage>,
    next_uid: u64,
    /// Bumped by `drop_connections`; folders opened under an older value are closed.
    generation: u64,
    refuse_submissions: bool,
}

/// Shared in-memory mail server. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryMailServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryMailServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop a message straight into `address`'s mailbox, bypassing submission.
    pub fn deliver(&self, address: &str, message: &MailMessage) {
        let mut state = self.lock();
        state.next_uid += 1;
        let uid = state.next_uid;
        state
            .mailboxes
            .entry(address.to_ascii_lowercase())
            .or_default()
            .push(Stored {
                uid,
                raw: message.to_rfc822(),
                seen: false,
                deleted: false,
            });
    }

    /// Messages still in `address`'s mailbox (not expunged).
    pub fn mailbox(&self, address: &str) -> Vec<MailMessage> {
        let state = self.lock();
        state
            .mailboxes
            .get(&address.to_ascii_lowercase())
            .map(|m| m.iter().map(|s| MailMessage::parse(&s.raw)).collect())
            .unwrap_or_default()
    }

    /// Every message accepted by the submitter, in order.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.lock().sent.clone()
    }

    /// Close every open folder, as a server restart would.
    pub fn drop_connections(&self) {
        self.lock().generation += 1;
    }

    /// Make subsequent submissions fail.
    pub fn refuse_submissions(&self, refuse: bool) {
        self.lock().refuse_submissions = refuse;
    }

    /// Store view of `address`'s mailbox.
    pub fn store(&self, address: &str) -> MemoryStore {
        MemoryStore {
            server: self.clone(),
            mailbox: address.to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl MailSubmitter for MemoryMailServer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let recipients = message.recipients();
        if recipients.is_empty() {
            return Err(MailError::protocol("no recipients"));
        }
        if self.lock().refuse_submissions {
            return Err(MailError::protocol("554 submission refused"));
        }
        for rcpt in &recipients {
            self.deliver(rcpt, message);
        }
        debug!(recipients = recipients.len(), "memory server accepted message");
        self.lock().sent.push(message.clone());
        Ok(())
    }
}

/// One mailbox of a [`MemoryMailServer`].
#[derive(Clone)]
pub struct MemoryStore {
    server: MemoryMailServer,
    mailbox: String,
}

#[async_trait]
impl MailStore for MemoryStore {
    fn display_name(&self) -> String {
        format!("memory:{}", self.mailbox)
    }

    async fn open_folder(&self, mode: FolderMode) -> Result<Box<dyn MailFolder>, MailError> {
        let generation = self.server.lock().generation;
        Ok(Box::new(MemoryFolder {
            server: self.server.clone(),
            mailbox: self.mailbox.clone(),
            mode,
            generation,
            open: true,
        }))
    }
}

struct MemoryFolder {
    server: MemoryMailServer,
    mailbox: String,
    mode: FolderMode,
    generation: u64,
    open: bool,
}

impl MemoryFolder {
    fn state(&mut self) -> Result<MutexGuard<'_, ServerState>, MailError> {
        if !self.open {
            return Err(MailError::FolderClosed(self.mailbox.clone()));
        }
        let state = self.server.lock();
        if state.generation != self.generation {
            self.open = false;
            return Err(MailError::FolderClosed(self.mailbox.clone()));
        }
        Ok(state)
    }

    fn writable(&self) -> Result<(), MailError> {
        match self.mode {
            FolderMode::ReadWrite => Ok(()),
            FolderMode::ReadOnly => Err(MailError::protocol("folder is read-only")),
        }
    }
}

#[async_trait]
impl MailFolder for MemoryFolder {
    fn is_open(&self) -> bool {
        self.open && self.server.lock().generation == self.generation
    }

    fn mode(&self) -> FolderMode {
        self.mode
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<FolderMessage>, MailError> {
        let mailbox = self.mailbox.clone();
        let state = self.state()?;
        let found = state
            .mailboxes
            .get(&mailbox)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|s| !s.deleted)
                    .filter_map(|s| {
                        let message = MailMessage::parse(&s.raw);
                        criteria.matches(&message, s.seen).then(|| FolderMessage {
                            id: MessageRef(s.uid.to_string()),
                            message,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn set_flags(&mut self, id: &MessageRef, flags: &[MessageFlag]) -> Result<(), MailError> {
        self.writable()?;
        let mailbox = self.mailbox.clone();
        let mut state = self.state()?;
        let stored = state
            .mailboxes
            .get_mut(&mailbox)
            .and_then(|m| m.iter_mut().find(|s| s.uid.to_string() == id.0))
            .ok_or_else(|| MailError::protocol(format!("no message {}", id.0)))?;
        for flag in flags {
            match flag {
                MessageFlag::Seen => stored.seen = true,
                MessageFlag::Deleted => stored.deleted = true,
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), MailError> {
        self.writable()?;
        let mailbox = self.mailbox.clone();
        let mut state = self.state()?;
        if let Some(messages) = state.mailboxes.get_mut(&mailbox) {
            messages.retain(|s| !s.deleted);
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), MailError> {
        self.state().map(|_| ())
    }

    async fn close(&mut self, expunge: bool) -> Result<(), MailError> {
        if !self.open {
            return Ok(());
        }
        if expunge && self.mode == FolderMode::ReadWrite {
            let mailbox = self.mailbox.clone();
            if let Ok(mut state) = self.state() {
                if let Some(messages) = state.mailboxes.get_mut(&mailbox) {
                    messages.retain(|s| !s.deleted);
                }
            }
        }
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(to: &str, subject: &str) -> MailMessage {
        let mut m = MailMessage::new();
        m.set_header("To", to);
        m.set_header("Subject", subject);
        m.set_body("hi");
        m
    }

    #[tokio::test]
    async fn submission_lands_in_recipient_mailbox() {
        let server = MemoryMailServer::new();
        server.send(&note("svc@example.com", "one")).await.unwrap();
        let inbox = server.mailbox("SVC@example.com");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].subject(), Some("one"));
        assert_eq!(server.sent().len(), 1);
    }

    #[tokio::test]
    async fn unseen_search_and_flags() {
        let server = MemoryMailServer::new();
        server.deliver("svc@example.com", &note("svc@example.com", "a"));
        server.deliver("svc@example.com", &note("svc@example.com", "b"));
        let mut folder = server.store("svc@example.com").open_folder(FolderMode::ReadWrite).await.unwrap();
        let found = folder.search(&SearchCriteria::Unseen).await.unwrap();
        assert_eq!(found.len(), 2);
        folder.set_flags(&found[0].id, &[MessageFlag::Seen]).await.unwrap();
        folder.set_flags(&found[1].id, &[MessageFlag::Deleted]).await.unwrap();
        assert!(folder.search(&SearchCriteria::Unseen).await.unwrap().is_empty());
        folder.close(true).await.unwrap();
        assert_eq!(server.mailbox("svc@example.com").len(), 1);
    }

    #[tokio::test]
    async fn read_only_folder_rejects_flags() {
        let server = MemoryMailServer::new();
        server.deliver("svc@example.com", &note("svc@example.com", "a"));
        let mut folder = server.store("svc@example.com").open_folder(FolderMode::ReadOnly).await.unwrap();
        let found = folder.search(&SearchCriteria::All).await.unwrap();
        assert!(folder.set_flags(&found[0].id, &[MessageFlag::Deleted]).await.is_err());
    }

    #[tokio::test]
    async fn dropped_connection_closes_folder() {
        let server = MemoryMailServer::new();
        let mut folder = server.store("svc@example.com").open_folder(FolderMode::ReadOnly).await.unwrap();
        server.drop_connections();
        assert!(!folder.is_open());
        let err = folder.search(&SearchCriteria::All).await.unwrap_err();
        assert!(err.is_folder_closed());
    }

    #[tokio::test]
    async fn header_search_is_substring_match() {
        let server = MemoryMailServer::new();
        let mut m = note("svc@example.com", "x");
        m.set_header("In-Reply-To", "<42.abc@example.com>");
        server.deliver("svc@example.com", &m);
        let mut folder = server.store("svc@example.com").open_folder(FolderMode::ReadOnly).await.unwrap();
        let hits = folder
            .search(&SearchCriteria::header("in-reply-to", "42.ABC@example.com"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
