/*
 * client.rs
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

//! Async IMAP client: greeting, CAPABILITY, STARTTLS, LOGIN/AUTHENTICATE,
//! SELECT/EXAMINE, UID SEARCH, UID FETCH, UID STORE, EXPUNGE, NOOP, LOGOUT.

use std::io;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::net::{is_disconnect, NetStream, TlsProfile};
use crate::sasl::{initial_client_response, respond_to_challenge, SaslError, SaslFirst, SaslMechanism};

/// IMAP client error (network, protocol, auth).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ImapClientError {
    pub message: String,
    /// Set when the server or the socket ended the session.
    pub disconnected: bool,
}

impl ImapClientError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            disconnected: false,
        }
    }

    fn bye(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            disconnected: true,
        }
    }
}

impl From<io::Error> for ImapClientError {
    fn from(e: io::Error) -> Self {
        Self {
            message: e.to_string(),
            disconnected: is_disconnect(&e),
        }
    }
}

impl From<SaslError> for ImapClientError {
    fn from(e: SaslError) -> Self {
        Self::new(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapStatus {
    Ok,
    No,
    Bad,
}

/// One response line, with the literal that followed it when it ended in `{N}`.
#[derive(Debug, Clone)]
pub struct ImapLine {
    pub raw: String,
    pub tag: Option<String>,
    pub status: Option<ImapStatus>,
    pub literal: Option<Vec<u8>>,
}

impl ImapLine {
    fn is_untagged(&self) -> bool {
        self.raw.starts_with('*')
    }

    fn is_continuation(&self) -> bool {
        self.raw.starts_with('+')
    }
}

fn parse_status(rest: &str) -> Option<ImapStatus> {
    let word = rest.split_whitespace().next()?;
    match word.to_ascii_uppercase().as_str() {
        "OK" => Some(ImapStatus::Ok),
        "NO" => Some(ImapStatus::No),
        "BAD" => Some(ImapStatus::Bad),
        _ => None,
    }
}

/// Parse `* OK ...`, `A001 NO ...`, `+ ...`.
fn parse_line(s: &str, literal: Option<Vec<u8>>) -> ImapLine {
    let (tag, rest) = if let Some(rest) = s.strip_prefix('*') {
        (None, rest.trim_start())
    } else if s.starts_with('+') {
        (None, "")
    } else {
        let mut sp = s.splitn(2, ' ');
        let t = sp.next().unwrap_or("").to_string();
        (Some(t).filter(|t| !t.is_empty()), sp.next().unwrap_or(""))
    };
    ImapLine {
        raw: s.to_string(),
        tag,
        status: parse_status(rest),
        literal,
    }
}

/// Read one CRLF line; if it ends with `{N}`, also read the N-byte literal.
async fn read_imap_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<ImapLine>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let b = stream.read_u8().await?;
        buf.push(b);
        if buf.ends_with(b"\r\n") {
            break;
        }
    }
    let line = String::from_utf8_lossy(&buf[..buf.len() - 2]).trim_end().to_string();
    let literal_size = line
        .rfind('{')
        .and_then(|open| line[open + 1..].strip_suffix('}'))
        .and_then(|n| n.trim().parse::<usize>().ok());
    let literal = match literal_size {
        Some(n) => {
            let mut lit = vec![0u8; n];
            stream.read_exact(&mut lit).await?;
            Some(lit)
        }
        None => None,
    };
    Ok(parse_line(&line, literal))
}

async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

/// IMAP quoted string.
pub fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parse capability words from `* CAPABILITY ...` or an `[CAPABILITY ...]` response code.
fn parse_capabilities(line: &str) -> Vec<String> {
    let s = line
        .strip_prefix("* CAPABILITY ")
        .or_else(|| {
            line.find("[CAPABILITY ")
                .map(|i| &line[i + 12..])
                .and_then(|t| t.split(']').next())
        })
        .unwrap_or("");
    s.split_whitespace().map(|w| w.to_ascii_uppercase()).collect()
}

/// `* SEARCH 3 7 9` → `[3, 7, 9]`.
fn parse_search(line: &str) -> Option<Vec<u32>> {
    let rest = line.strip_prefix("* SEARCH")?;
    Some(rest.split_whitespace().filter_map(|n| n.parse().ok()).collect())
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ImapOptions {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    pub starttls: bool,
    pub credentials: Option<(String, String)>,
    pub connect_timeout: Duration,
}

/// Result of SELECT/EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectResult {
    pub exists: u32,
    pub uid_validity: Option<u32>,
    pub read_only: bool,
}

/// Authenticated IMAP session.
pub struct ImapSession {
    stream: NetStream,
    read_buf: Vec<u8>,
    capabilities: Vec<String>,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect, optionally upgrade with STARTTLS, and authenticate.
    pub async fn connect(options: &ImapOptions) -> Result<Self, ImapClientError> {
        let stream = NetStream::connect(
            &options.host,
            options.port,
            options.implicit_tls,
            TlsProfile::Mail,
            options.connect_timeout,
        )
        .await?;
        let mut session = Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            capabilities: Vec::new(),
            tag_counter: 0,
        };
        let greeting = read_imap_line(&mut session.stream, &mut session.read_buf).await?;
        if !greeting.raw.starts_with("* OK") && !greeting.raw.starts_with("* PREAUTH") {
            return Err(ImapClientError::new(format!("unexpected greeting: {}", greeting.raw)));
        }
        let preauth = greeting.raw.starts_with("* PREAUTH");
        session.capabilities = parse_capabilities(&greeting.raw);
        if session.capabilities.is_empty() {
            session.refresh_capabilities().await?;
        }

        if !session.stream.is_secure() && options.starttls && session.has_capability("STARTTLS") {
            session.command_ok("STARTTLS").await?;
            let Self { stream, .. } = session;
            let stream = stream.upgrade_to_tls(&options.host).await?;
            session = Self {
                stream,
                read_buf: Vec::with_capacity(4096),
                capabilities: Vec::new(),
                tag_counter: 100,
            };
            session.refresh_capabilities().await?;
        }

        if let (Some((user, password)), false) = (&options.credentials, preauth) {
            session.authenticate(user, password).await?;
        }
        debug!(host = %options.host, secure = session.stream.is_secure(), "IMAP session ready");
        Ok(session)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(cap))
    }

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{:04}", self.tag_counter)
    }

    async fn refresh_capabilities(&mut self) -> Result<(), ImapClientError> {
        let untagged = self.command_ok("CAPABILITY").await?;
        if let Some(line) = untagged.iter().find(|l| l.raw.starts_with("* CAPABILITY ")) {
            self.capabilities = parse_capabilities(&line.raw);
        }
        Ok(())
    }

    /// Send a tagged command; collect untagged lines until the tagged status.
    async fn command(&mut self, command: &str) -> Result<(Vec<ImapLine>, ImapLine), ImapClientError> {
        let tag = self.next_tag();
        write_line(&mut self.stream, format!("{} {}", tag, command).as_bytes()).await?;
        let mut untagged = Vec::new();
        loop {
            let line = read_imap_line(&mut self.stream, &mut self.read_buf).await?;
            if line.tag.as_deref() == Some(tag.as_str()) {
                return Ok((untagged, line));
            }
            if line.is_untagged() && line.raw.to_ascii_uppercase().starts_with("* BYE") {
                return Err(ImapClientError::bye(line.raw));
            }
            untagged.push(line);
        }
    }

    /// Like [`command`](Self::command) but fails unless the status is OK.
    async fn command_ok(&mut self, command: &str) -> Result<Vec<ImapLine>, ImapClientError> {
        let (untagged, done) = self.command(command).await?;
        match done.status {
            Some(ImapStatus::Ok) => Ok(untagged),
            _ => Err(ImapClientError::new(done.raw)),
        }
    }

    async fn authenticate(&mut self, user: &str, password: &str) -> Result<(), ImapClientError> {
        let offered: Vec<String> = self
            .capabilities
            .iter()
            .filter_map(|c| c.strip_prefix("AUTH="))
            .map(str::to_string)
            .collect();
        let secure = self.stream.is_secure();
        match SaslMechanism::choose(&offered, secure, false) {
            Some(mechanism) => self.authenticate_sasl(mechanism, user, password).await,
            None if self.has_capability("LOGINDISABLED") => Err(ImapClientError::new(
                "server disables LOGIN and offers no usable mechanism",
            )),
            None => {
                let cmd = format!("LOGIN {} {}", quote_string(user), quote_string(password));
                self.command_ok(&cmd).await.map(|_| ())
            }
        }
    }

    async fn authenticate_sasl(
        &mut self,
        mechanism: SaslMechanism,
        user: &str,
        password: &str,
    ) -> Result<(), ImapClientError> {
        let (initial, mut scram_state) = match initial_client_response(mechanism, "", user, password)? {
            SaslFirst::Done(b) => (b, None),
            SaslFirst::ScramContinue(b, state) => (b, Some(state)),
        };
        let tag = self.next_tag();
        let mut cmd = format!("{} AUTHENTICATE {}", tag, mechanism.name());
        if !initial.is_empty() && self.has_capability("SASL-IR") {
            cmd.push(' ');
            cmd.push_str(&STANDARD.encode(&initial));
        } else if !initial.is_empty() {
            // no SASL-IR: send the initial response on the first empty challenge
            write_line(&mut self.stream, cmd.as_bytes()).await?;
            let line = read_imap_line(&mut self.stream, &mut self.read_buf).await?;
            if !line.is_continuation() {
                return Err(ImapClientError::new(line.raw));
            }
            write_line(&mut self.stream, STANDARD.encode(&initial).as_bytes()).await?;
            return self.finish_sasl(&tag, mechanism, user, password, &mut scram_state).await;
        }
        write_line(&mut self.stream, cmd.as_bytes()).await?;
        self.finish_sasl(&tag, mechanism, user, password, &mut scram_state).await
    }

    async fn finish_sasl(
        &mut self,
        tag: &str,
        mechanism: SaslMechanism,
        user: &str,
        password: &str,
        scram_state: &mut Option<crate::sasl::ScramSha256State>,
    ) -> Result<(), ImapClientError> {
        loop {
            let line = read_imap_line(&mut self.stream, &mut self.read_buf).await?;
            if line.tag.as_deref() == Some(tag) {
                return match line.status {
                    Some(ImapStatus::Ok) => Ok(()),
                    _ => Err(ImapClientError::new(format!("authentication failed: {}", line.raw))),
                };
            }
            if !line.is_continuation() {
                continue;
            }
            if mechanism == SaslMechanism::ScramSha256 && scram_state.is_none() {
                // server-final: verifier only
                write_line(&mut self.stream, b"").await?;
                continue;
            }
            let challenge = line.raw[1..].trim();
            let response = respond_to_challenge(mechanism, challenge, user, password, scram_state.as_ref())?;
            *scram_state = None;
            write_line(&mut self.stream, STANDARD.encode(&response).as_bytes()).await?;
        }
    }

    /// SELECT (read-write) or EXAMINE (read-only) a mailbox.
    pub async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<SelectResult, ImapClientError> {
        let verb = if read_only { "EXAMINE" } else { "SELECT" };
        let (untagged, done) = self.command(&format!("{} {}", verb, quote_string(mailbox))).await?;
        if done.status != Some(ImapStatus::Ok) {
            return Err(ImapClientError::new(done.raw));
        }
        let mut result = SelectResult {
            read_only: read_only || done.raw.to_ascii_uppercase().contains("[READ-ONLY]"),
            ..SelectResult::default()
        };
        for line in &untagged {
            let rest = line.raw.trim_start_matches('*').trim();
            if let Some(n) = rest.strip_suffix(" EXISTS").and_then(|n| n.trim().parse().ok()) {
                result.exists = n;
            } else if let Some(i) = rest.find("[UIDVALIDITY ") {
                result.uid_validity = rest[i + 13..]
                    .split(|c: char| c == ']' || c.is_whitespace())
                    .next()
                    .and_then(|n| n.parse().ok());
            }
        }
        Ok(result)
    }

    /// `UID SEARCH <criteria>`; `criteria` is sent verbatim.
    pub async fn uid_search(&mut self, criteria: &str) -> Result<Vec<u32>, ImapClientError> {
        let untagged = self.command_ok(&format!("UID SEARCH {}", criteria)).await?;
        Ok(untagged
            .iter()
            .filter_map(|l| parse_search(&l.raw))
            .flatten()
            .collect())
    }

    /// Full message by UID without setting \Seen.
    pub async fn uid_fetch_message(&mut self, uid: u32) -> Result<Vec<u8>, ImapClientError> {
        let untagged = self.command_ok(&format!("UID FETCH {} BODY.PEEK[]", uid)).await?;
        untagged
            .into_iter()
            .find(|l| l.raw.contains(" FETCH (") && l.literal.is_some())
            .and_then(|l| l.literal)
            .ok_or_else(|| ImapClientError::new(format!("UID FETCH {} returned no body", uid)))
    }

    /// `UID STORE <uid> +FLAGS.SILENT (<flags>)`.
    pub async fn uid_add_flags(&mut self, uid: u32, flags: &[&str]) -> Result<(), ImapClientError> {
        let cmd = format!("UID STORE {} +FLAGS.SILENT ({})", uid, flags.join(" "));
        self.command_ok(&cmd).await.map(|_| ())
    }

    pub async fn expunge(&mut self) -> Result<(), ImapClientError> {
        self.command_ok("EXPUNGE").await.map(|_| ())
    }

    pub async fn noop(&mut self) -> Result<(), ImapClientError> {
        self.command_ok("NOOP").await.map(|_| ())
    }

    /// LOGOUT and drop the connection. The server's BYE is expected.
    pub async fn logout(mut self) -> Result<(), ImapClientError> {
        match self.command("LOGOUT").await {
            Ok(_) => Ok(()),
            Err(e) if e.disconnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}
